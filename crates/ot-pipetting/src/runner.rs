//! 单次吸液/排液周期的状态机
//!
//! 步骤严格按顺序执行，任何一步失败都立即返回，不重试：
//!
//! 1. Approach: 弧线移动到孔口；吸液时准备柱塞
//! 2. GatherAirGap: 吸液且配置了湿空气间隙时先吸入空气
//! 3. Submerge: 弧线移动到接近高度，再按下探速度直线下探
//! 4. Action: 原地吸液或排液（排液后排出残余并推出）
//! 5. Delay: 静置
//! 6. Retract: 按回提速度直线回提到结束液面上方
//! 7. BlowOut: 排液且配置了吹出体积时吹出
//! 8. Finish: 直线回到孔口
//!
//! 下探前与回到孔口后分别触发 pre / post 回调。

use crate::error::PipettingError;
use crate::heights::PipettingHeights;
use crate::pipette::{MoveStyle, Pipette};
use crate::settings::LiquidClassSettings;
use crate::timestamps::{CycleEvent, SampleTimestamps};
use ot_driver::Driver;
use ot_liquid::{LabwareWell, VolumeChange};
use ot_pose::FrameGraph;
use std::fmt;
use tracing::{debug, trace};

/// 周期步骤（按执行顺序排列）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipettingStep {
    Approach,
    GatherAirGap,
    Submerge,
    Action,
    Delay,
    Retract,
    BlowOut,
    Finish,
}

impl PipettingStep {
    pub const ALL: [PipettingStep; 8] = [
        PipettingStep::Approach,
        PipettingStep::GatherAirGap,
        PipettingStep::Submerge,
        PipettingStep::Action,
        PipettingStep::Delay,
        PipettingStep::Retract,
        PipettingStep::BlowOut,
        PipettingStep::Finish,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PipettingStep::Approach => "approach",
            PipettingStep::GatherAirGap => "gather_air_gap",
            PipettingStep::Submerge => "submerge",
            PipettingStep::Action => "action",
            PipettingStep::Delay => "delay",
            PipettingStep::Retract => "retract",
            PipettingStep::BlowOut => "blow_out",
            PipettingStep::Finish => "finish",
        }
    }
}

impl fmt::Display for PipettingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 回调收到的周期信息
#[derive(Debug, Clone, Copy)]
pub struct CycleInfo<'a> {
    pub target: LabwareWell<'a>,
    pub change: VolumeChange,
    pub heights: PipettingHeights,
    pub settings: &'a LiquidClassSettings,
}

/// 周期回调
///
/// 闭包 `FnMut(&CycleInfo<'_>)` 自动实现该 trait。回调只用于观测，
/// 不能中止周期。
pub trait CycleCallback {
    fn on_cycle_event(&mut self, info: &CycleInfo<'_>);
}

impl<F> CycleCallback for F
where
    F: FnMut(&CycleInfo<'_>),
{
    fn on_cycle_event(&mut self, info: &CycleInfo<'_>) {
        self(info)
    }
}

/// 单次周期的输入
#[derive(Debug, Clone, Copy)]
pub struct CyclePlan<'a> {
    pub target: LabwareWell<'a>,
    pub change: VolumeChange,
    pub heights: PipettingHeights,
    pub settings: &'a LiquidClassSettings,
}

impl<'a> CyclePlan<'a> {
    fn info(&self) -> CycleInfo<'a> {
        CycleInfo {
            target: self.target,
            change: self.change,
            heights: self.heights,
            settings: self.settings,
        }
    }
}

/// 周期状态机
pub struct LiquidSettingsRunner<'a, 'p, D: Driver> {
    pipette: &'p mut Pipette<D>,
    plan: CyclePlan<'a>,
    started: Option<PipettingStep>,
    completed: Vec<PipettingStep>,
}

impl<'a, 'p, D: Driver> LiquidSettingsRunner<'a, 'p, D> {
    pub fn new(pipette: &'p mut Pipette<D>, plan: CyclePlan<'a>) -> Self {
        LiquidSettingsRunner {
            pipette,
            plan,
            started: None,
            completed: Vec::with_capacity(PipettingStep::ALL.len()),
        }
    }

    /// 最近开始执行的步骤（失败时即失败所在步骤）
    pub fn started(&self) -> Option<PipettingStep> {
        self.started
    }

    /// 已完成的步骤（按执行顺序，跳过的步骤不计）
    pub fn completed(&self) -> &[PipettingStep] {
        &self.completed
    }

    /// 是否已经开始执行吸/排液动作
    ///
    /// 为真时，失败后孔内实际体积已无法确定。
    pub fn action_attempted(&self) -> bool {
        self.started.is_some_and(|step| step >= PipettingStep::Action)
    }

    fn aspirating(&self) -> bool {
        self.plan.change.is_aspirate()
    }

    /// 执行整个周期
    pub fn run(
        &mut self,
        graph: &mut FrameGraph,
        timestamps: &mut SampleTimestamps,
        pre: Option<&mut Box<dyn CycleCallback>>,
        post: Option<&mut Box<dyn CycleCallback>>,
    ) -> Result<(), PipettingError> {
        let (pre_event, action_event, post_event) = if self.aspirating() {
            (CycleEvent::PreAspirate, CycleEvent::Aspirate, CycleEvent::PostAspirate)
        } else {
            (CycleEvent::PreDispense, CycleEvent::Dispense, CycleEvent::PostDispense)
        };
        debug!(
            well = %self.plan.target.display_name(),
            change = ?self.plan.change,
            heights = ?self.plan.heights,
            "Running pipetting cycle"
        );

        self.step(PipettingStep::Approach, |r| r.approach(graph))?;

        timestamps.record(pre_event);
        if let Some(callback) = pre {
            callback.on_cycle_event(&self.plan.info());
        }

        if self.aspirating() && self.plan.settings.wet_air_gap.volume > 0.0 {
            self.step(PipettingStep::GatherAirGap, |r| r.gather_air_gap())?;
        }
        self.step(PipettingStep::Submerge, |r| r.submerge(graph))?;
        self.step(PipettingStep::Action, |r| r.action())?;
        timestamps.record(action_event);

        self.step(PipettingStep::Delay, |r| r.settle())?;
        self.step(PipettingStep::Retract, |r| r.retract(graph))?;
        if !self.aspirating() && self.plan.settings.blow_out.volume > 0.0 {
            self.step(PipettingStep::BlowOut, |r| r.pipette.blow_out())?;
        }
        self.step(PipettingStep::Finish, |r| r.finish(graph))?;

        timestamps.record(post_event);
        if let Some(callback) = post {
            callback.on_cycle_event(&self.plan.info());
        }
        Ok(())
    }

    fn step<F>(&mut self, step: PipettingStep, f: F) -> Result<(), PipettingError>
    where
        F: FnOnce(&mut Self) -> Result<(), PipettingError>,
    {
        trace!(%step, "Pipetting step");
        self.started = Some(step);
        f(self)?;
        self.completed.push(step);
        Ok(())
    }

    fn approach(&mut self, graph: &mut FrameGraph) -> Result<(), PipettingError> {
        let top = self.pipette.well_top(graph, self.plan.target.well)?;
        self.pipette.move_to(graph, top, MoveStyle::Arc, None)?;
        if self.aspirating() {
            self.pipette.prepare_for_aspirate()?;
        }
        Ok(())
    }

    fn gather_air_gap(&mut self) -> Result<(), PipettingError> {
        let air_gap = self.plan.settings.wet_air_gap;
        self.pipette.aspirate_air_gap(air_gap.volume, air_gap.flow_rate)
    }

    fn submerge(&mut self, graph: &mut FrameGraph) -> Result<(), PipettingError> {
        let well = self.plan.target.well;
        let speed = self
            .plan
            .settings
            .submerge
            .speed
            .unwrap_or(self.pipette.config().speeds(self.aspirating()).submerge);

        let approach = self.pipette.well_bottom(graph, well, self.plan.heights.approach())?;
        self.pipette.move_to(graph, approach, MoveStyle::Arc, None)?;
        let submerged = self.pipette.well_bottom(graph, well, self.plan.heights.submerged())?;
        self.pipette.move_to(graph, submerged, MoveStyle::Direct, Some(speed))?;
        Ok(())
    }

    fn action(&mut self) -> Result<(), PipettingError> {
        let settings = self.plan.settings;
        let volume = self.plan.change.amount();
        if self.aspirating() {
            return self.pipette.aspirate_at(volume, settings.aspirate.flow_rate);
        }

        self.pipette.dispense_at(Some(volume), settings.dispense.flow_rate)?;
        // 残余（湿空气间隙）以空气间隙流速排出
        let leftover = self.pipette.current_volume();
        if leftover > 0.0 {
            self.pipette
                .dispense_at(Some(leftover), settings.wet_air_gap.flow_rate)?;
        }
        if settings.dispense.push_out > 0.0 {
            self.pipette.push_out(settings.dispense.push_out)?;
        }
        Ok(())
    }

    fn settle(&mut self) -> Result<(), PipettingError> {
        let settings = self.plan.settings;
        let delay = if self.aspirating() {
            settings.aspirate.delay
        } else {
            settings.dispense.delay
        };
        if delay > 0.0 {
            self.pipette.delay(delay)?;
        }
        Ok(())
    }

    fn retract(&mut self, graph: &mut FrameGraph) -> Result<(), PipettingError> {
        let speed = self
            .plan
            .settings
            .retract
            .speed
            .unwrap_or(self.pipette.config().speeds(self.aspirating()).retract);
        let retract = self
            .pipette
            .well_bottom(graph, self.plan.target.well, self.plan.heights.retract())?;
        self.pipette.move_to(graph, retract, MoveStyle::Direct, Some(speed))?;
        Ok(())
    }

    fn finish(&mut self, graph: &mut FrameGraph) -> Result<(), PipettingError> {
        let top = self.pipette.well_top(graph, self.plan.target.well)?;
        self.pipette.move_to(graph, top, MoveStyle::Direct, None)?;
        Ok(())
    }
}
