//! 移液时间戳
//!
//! 每次吸液/排液周期在下探前、吸/排液完成时、回提结束后各打一个时间戳，
//! 用于与外部采样（称重、相机）对齐。

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

/// 当前系统时间（微秒，UNIX 纪元起）
pub fn current_time_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// 周期中的打点位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleEvent {
    PreAspirate,
    Aspirate,
    PostAspirate,
    PreDispense,
    Dispense,
    PostDispense,
}

impl CycleEvent {
    pub const ALL: [CycleEvent; 6] = [
        CycleEvent::PreAspirate,
        CycleEvent::Aspirate,
        CycleEvent::PostAspirate,
        CycleEvent::PreDispense,
        CycleEvent::Dispense,
        CycleEvent::PostDispense,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CycleEvent::PreAspirate => "pre_aspirate",
            CycleEvent::Aspirate => "aspirate",
            CycleEvent::PostAspirate => "post_aspirate",
            CycleEvent::PreDispense => "pre_dispense",
            CycleEvent::Dispense => "dispense",
            CycleEvent::PostDispense => "post_dispense",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// 一次采样（一次吸液 + 一次排液）的时间戳
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SampleTimestamps {
    tag: String,
    times_us: [Option<u64>; 6],
}

impl SampleTimestamps {
    pub fn new(tag: impl Into<String>) -> Self {
        SampleTimestamps {
            tag: tag.into(),
            times_us: [None; 6],
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// 以当前时间打点，重复打点覆盖旧值
    pub fn record(&mut self, event: CycleEvent) {
        self.record_at(event, current_time_us());
    }

    pub fn record_at(&mut self, event: CycleEvent, time_us: u64) {
        self.times_us[event.index()] = Some(time_us);
    }

    pub fn get(&self, event: CycleEvent) -> Option<u64> {
        self.times_us[event.index()]
    }

    /// CSV 表头
    pub fn csv_header() -> String {
        let mut header = String::from("tag");
        for event in CycleEvent::ALL {
            header.push(',');
            header.push_str(event.name());
        }
        header
    }

    /// 一行 CSV，时间以秒表示，缺失的打点留空
    pub fn as_csv(&self) -> String {
        let mut line = self.tag.clone();
        for time in self.times_us {
            line.push(',');
            if let Some(us) = time {
                let _ = write!(line, "{}.{:06}", us / 1_000_000, us % 1_000_000);
            }
        }
        line
    }
}
