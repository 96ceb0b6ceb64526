//! 驱动能力接口
//!
//! 运动栈把真正驱动电机、读取传感器的串口/CAN 驱动视为不透明的能力。
//! 所有调用都是阻塞的：返回时动作已经完成（或已经失败）。

use crate::axis::{AxisId, AxisPositions};
use crate::error::DriverError;
use std::time::Duration;

/// 运动选项
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MoveOptions {
    /// Z 轴以低电流移动
    pub low_power_z: bool,
    /// 运动速度（mm/s），`None` 表示驱动默认速度
    pub speed: Option<f64>,
}

impl MoveOptions {
    /// 指定速度
    pub fn with_speed(speed: f64) -> Self {
        MoveOptions {
            low_power_z: false,
            speed: Some(speed),
        }
    }
}

/// 驱动能力
pub trait Driver {
    /// 所有给定物理轴同时移动到绝对位置
    fn move_axes(&mut self, targets: &AxisPositions, options: MoveOptions) -> Result<(), DriverError>;

    /// 回零，返回回零后的绝对位置
    fn home(&mut self, axes: &[AxisId]) -> Result<AxisPositions, DriverError>;

    /// 单轴探测运动，返回探测结束时的位置
    fn probe_axis(&mut self, axis: AxisId, movement: f64) -> Result<AxisPositions, DriverError>;

    /// 以 `rate`（µL/s）吸液 `volume`（µL）
    fn aspirate(&mut self, volume: f64, rate: f64) -> Result<(), DriverError>;

    /// 以 `rate`（µL/s）排液 `volume`（µL）
    fn dispense(&mut self, volume: f64, rate: f64) -> Result<(), DriverError>;

    /// 吹出剩余内容
    fn blow_out(&mut self) -> Result<(), DriverError>;

    /// 柱塞越过底部位置继续推出 `volume`（µL）
    fn push_out(&mut self, volume: f64) -> Result<(), DriverError>;

    /// 准备吸液（幂等）
    fn prepare_for_aspirate(&mut self) -> Result<(), DriverError>;

    /// 阻塞等待
    fn delay(&mut self, seconds: f64) -> Result<(), DriverError>;
}

impl<D: Driver + ?Sized> Driver for &mut D {
    fn move_axes(&mut self, targets: &AxisPositions, options: MoveOptions) -> Result<(), DriverError> {
        (**self).move_axes(targets, options)
    }

    fn home(&mut self, axes: &[AxisId]) -> Result<AxisPositions, DriverError> {
        (**self).home(axes)
    }

    fn probe_axis(&mut self, axis: AxisId, movement: f64) -> Result<AxisPositions, DriverError> {
        (**self).probe_axis(axis, movement)
    }

    fn aspirate(&mut self, volume: f64, rate: f64) -> Result<(), DriverError> {
        (**self).aspirate(volume, rate)
    }

    fn dispense(&mut self, volume: f64, rate: f64) -> Result<(), DriverError> {
        (**self).dispense(volume, rate)
    }

    fn blow_out(&mut self) -> Result<(), DriverError> {
        (**self).blow_out()
    }

    fn push_out(&mut self, volume: f64) -> Result<(), DriverError> {
        (**self).push_out(volume)
    }

    fn prepare_for_aspirate(&mut self) -> Result<(), DriverError> {
        (**self).prepare_for_aspirate()
    }

    fn delay(&mut self, seconds: f64) -> Result<(), DriverError> {
        (**self).delay(seconds)
    }
}

impl<D: Driver + ?Sized> Driver for Box<D> {
    fn move_axes(&mut self, targets: &AxisPositions, options: MoveOptions) -> Result<(), DriverError> {
        (**self).move_axes(targets, options)
    }

    fn home(&mut self, axes: &[AxisId]) -> Result<AxisPositions, DriverError> {
        (**self).home(axes)
    }

    fn probe_axis(&mut self, axis: AxisId, movement: f64) -> Result<AxisPositions, DriverError> {
        (**self).probe_axis(axis, movement)
    }

    fn aspirate(&mut self, volume: f64, rate: f64) -> Result<(), DriverError> {
        (**self).aspirate(volume, rate)
    }

    fn dispense(&mut self, volume: f64, rate: f64) -> Result<(), DriverError> {
        (**self).dispense(volume, rate)
    }

    fn blow_out(&mut self) -> Result<(), DriverError> {
        (**self).blow_out()
    }

    fn push_out(&mut self, volume: f64) -> Result<(), DriverError> {
        (**self).push_out(volume)
    }

    fn prepare_for_aspirate(&mut self) -> Result<(), DriverError> {
        (**self).prepare_for_aspirate()
    }

    fn delay(&mut self, seconds: f64) -> Result<(), DriverError> {
        (**self).delay(seconds)
    }
}

/// 真实时钟：用 `spin_sleep` 做精确阻塞等待
#[derive(Debug, Clone, Copy, Default)]
pub struct RealtimeClock;

impl RealtimeClock {
    /// 阻塞 `seconds` 秒
    ///
    /// 负数或非有限值视为非法命令。
    pub fn sleep(&self, seconds: f64) -> Result<(), DriverError> {
        let duration = seconds_to_duration(seconds)?;
        if !duration.is_zero() {
            spin_sleep::sleep(duration);
        }
        Ok(())
    }
}

/// 秒数 → `Duration`
pub fn seconds_to_duration(seconds: f64) -> Result<Duration, DriverError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(DriverError::InvalidCommand(format!(
            "invalid delay of {} seconds",
            seconds
        )));
    }
    Duration::try_from_secs_f64(seconds).map_err(|e| {
        DriverError::InvalidCommand(format!("invalid delay of {} seconds: {}", seconds, e))
    })
}
