//! 按液体类别执行吸液/排液
//!
//! [`PipetteLiquidClass`] 是协议步骤调用的入口：根据账本预估前后液面，
//! 计算移液高度，跑完整个周期，成功后把体积变化提交到账本。
//!
//! # 失败时的账本
//!
//! - 吸/排液动作之前失败：账本不变
//! - 动作开始之后失败：所有受影响的孔标记为体积未知，原错误原样返回

use crate::error::PipettingError;
use crate::heights::PipettingHeights;
use crate::pipette::{FlowRates, Pipette};
use crate::runner::{CycleCallback, CycleInfo, CyclePlan, LiquidSettingsRunner};
use crate::settings::LiquidClassSettings;
use crate::table::LiquidClassTable;
use crate::timestamps::SampleTimestamps;
use ot_driver::Driver;
use ot_liquid::{LabwareWell, LiquidTracker, VolumeChange};
use ot_pose::FrameGraph;
use tracing::{info, warn};

/// 体积比较容差（µL）
const VOLUME_EPSILON: f64 = 1e-9;

/// 各方向的 pre / post 回调
#[derive(Default)]
pub struct CycleCallbacks {
    on_pre_aspirate: Option<Box<dyn CycleCallback>>,
    on_post_aspirate: Option<Box<dyn CycleCallback>>,
    on_pre_dispense: Option<Box<dyn CycleCallback>>,
    on_post_dispense: Option<Box<dyn CycleCallback>>,
}

impl CycleCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 吸液下探之前
    pub fn on_pre_aspirate<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&CycleInfo<'_>) + 'static,
    {
        self.on_pre_aspirate = Some(Box::new(callback));
        self
    }

    /// 吸液回到孔口之后
    pub fn on_post_aspirate<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&CycleInfo<'_>) + 'static,
    {
        self.on_post_aspirate = Some(Box::new(callback));
        self
    }

    /// 排液下探之前
    pub fn on_pre_dispense<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&CycleInfo<'_>) + 'static,
    {
        self.on_pre_dispense = Some(Box::new(callback));
        self
    }

    /// 排液回到孔口之后
    pub fn on_post_dispense<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&CycleInfo<'_>) + 'static,
    {
        self.on_post_dispense = Some(Box::new(callback));
        self
    }

    fn for_direction(
        &mut self,
        aspirating: bool,
    ) -> (Option<&mut Box<dyn CycleCallback>>, Option<&mut Box<dyn CycleCallback>>) {
        if aspirating {
            (self.on_pre_aspirate.as_mut(), self.on_post_aspirate.as_mut())
        } else {
            (self.on_pre_dispense.as_mut(), self.on_post_dispense.as_mut())
        }
    }
}

/// 带液体类别的移液器
pub struct PipetteLiquidClass<D: Driver> {
    pipette: Pipette<D>,
    settings: LiquidClassSettings,
    callbacks: CycleCallbacks,
    timestamps: Vec<SampleTimestamps>,
}

impl<D: Driver> PipetteLiquidClass<D> {
    /// 以默认参数创建
    pub fn new(pipette: Pipette<D>) -> Self {
        let mut lc = PipetteLiquidClass {
            pipette,
            settings: LiquidClassSettings::default(),
            callbacks: CycleCallbacks::default(),
            timestamps: Vec::new(),
        };
        lc.apply_to_pipette();
        lc
    }

    pub fn pipette(&self) -> &Pipette<D> {
        &self.pipette
    }

    pub fn pipette_mut(&mut self) -> &mut Pipette<D> {
        &mut self.pipette
    }

    pub fn into_pipette(self) -> Pipette<D> {
        self.pipette
    }

    /// 当前液体类别参数
    pub fn settings(&self) -> &LiquidClassSettings {
        &self.settings
    }

    /// 设置液体类别参数，同时更新移液器的移动速度和流速
    pub fn set_liquid_class(&mut self, settings: LiquidClassSettings) -> Result<(), PipettingError> {
        settings.validate()?;
        self.settings = settings;
        self.apply_to_pipette();
        Ok(())
    }

    /// 从表中解析 (移液器, `tip`, `volume`) 的参数并设置
    pub fn apply_liquid_class(
        &mut self,
        table: &LiquidClassTable,
        tip: u32,
        volume: f64,
    ) -> Result<(), PipettingError> {
        let settings = table.resolve(self.pipette.pipette_volume(), tip, volume)?;
        self.set_liquid_class(settings)
    }

    fn apply_to_pipette(&mut self) {
        self.pipette.set_default_speed(Some(self.settings.traverse.speed));
        self.pipette.set_flow_rates(FlowRates {
            aspirate: self.settings.aspirate.flow_rate,
            dispense: self.settings.dispense.flow_rate,
            blow_out: self.settings.blow_out.flow_rate,
        });
    }

    /// 替换全部回调
    pub fn assign_callbacks(&mut self, callbacks: CycleCallbacks) {
        self.callbacks = callbacks;
    }

    /// 开始一组新的时间戳，之后的周期写入这一组
    pub fn create_empty_timestamp(&mut self, tag: impl Into<String>) {
        self.timestamps.push(SampleTimestamps::new(tag));
    }

    pub fn get_timestamps(&self) -> &[SampleTimestamps] {
        &self.timestamps
    }

    pub fn clear_timestamps(&mut self) {
        self.timestamps.clear();
    }

    /// 从 `target` 吸液 `volume`（每通道 µL）
    pub fn aspirate(
        &mut self,
        graph: &mut FrameGraph,
        volume: f64,
        target: LabwareWell<'_>,
        tracker: &mut LiquidTracker,
    ) -> Result<(), PipettingError> {
        self.cycle(graph, VolumeChange::Aspirate(volume), target, tracker)
    }

    /// 向 `target` 排液 `volume`（每通道 µL）
    pub fn dispense(
        &mut self,
        graph: &mut FrameGraph,
        volume: f64,
        target: LabwareWell<'_>,
        tracker: &mut LiquidTracker,
    ) -> Result<(), PipettingError> {
        self.cycle(graph, VolumeChange::Dispense(volume), target, tracker)
    }

    fn check_tip_capacity(&self, change: VolumeChange) -> Result<(), PipettingError> {
        let current = self.pipette.current_volume();
        let volume = change.amount();
        if change.is_aspirate() {
            let needed = current + volume + self.settings.wet_air_gap.volume;
            if needed > self.pipette.max_volume() + VOLUME_EPSILON {
                return Err(PipettingError::ContractViolation(format!(
                    "aspirating {} uL would overfill the tip ({} of {} uL)",
                    volume,
                    needed,
                    self.pipette.max_volume()
                )));
            }
        } else if volume > current + VOLUME_EPSILON {
            return Err(PipettingError::ContractViolation(format!(
                "cannot dispense {} uL: tip holds {} uL",
                volume, current
            )));
        } else if current - volume > self.pipette.air_gap() + VOLUME_EPSILON {
            // 排液后吸头里会剩下液体，残余排出步骤会把它算错到目标孔
            return Err(PipettingError::ContractViolation(format!(
                "dispensing {} uL would leave {} uL of liquid in the tip",
                volume,
                current - volume - self.pipette.air_gap()
            )));
        }
        Ok(())
    }

    fn cycle(
        &mut self,
        graph: &mut FrameGraph,
        change: VolumeChange,
        target: LabwareWell<'_>,
        tracker: &mut LiquidTracker,
    ) -> Result<(), PipettingError> {
        let volume = change.amount();
        if !volume.is_finite() || volume <= 0.0 {
            return Err(PipettingError::ContractViolation(format!(
                "pipetting volume must be positive, got {}",
                volume
            )));
        }
        let channels = self.pipette.channels();

        // 所有校验都在第一次运动之前完成
        self.check_tip_capacity(change)?;
        let (before, after) = tracker.get_before_and_after_heights(target, channels, change)?;
        tracker.check_affected_wells(target, channels, change)?;

        let settings = self.settings;
        let heights = PipettingHeights::new(
            before,
            after,
            settings.submerge.distance,
            settings.retract.distance,
            self.pipette.config().labware_bottom_clearance,
        );
        info!(
            well = %target.display_name(),
            ?change,
            channels,
            before,
            after,
            "Starting pipetting cycle"
        );

        if self.timestamps.is_empty() {
            self.timestamps.push(SampleTimestamps::default());
        }
        let last = self.timestamps.len() - 1;
        let stamps = &mut self.timestamps[last];
        let (pre, post) = self.callbacks.for_direction(change.is_aspirate());

        let plan = CyclePlan {
            target,
            change,
            heights,
            settings: &settings,
        };
        let mut runner = LiquidSettingsRunner::new(&mut self.pipette, plan);
        match runner.run(graph, stamps, pre, post) {
            Ok(()) => {
                tracker.update_affected_wells(target, channels, change)?;
                info!(well = %target.display_name(), ?change, "Pipetting cycle finished");
                Ok(())
            },
            Err(err) => {
                warn!(
                    well = %target.display_name(),
                    step = ?runner.started(),
                    error = %err,
                    "Pipetting cycle failed"
                );
                if runner.action_attempted() {
                    if let Err(mark_err) = tracker.mark_affected_unknown(target, channels) {
                        warn!(error = %mark_err, "Failed to mark wells as unknown");
                    }
                }
                Err(err)
            },
        }
    }
}
