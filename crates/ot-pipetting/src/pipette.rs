//! 移液器
//!
//! 在 `Mover` 之上增加移液器状态：通道数、量程、吸头、当前体积、流速，
//! 以及孔位坐标换算和弧线/直线移动。
//!
//! Mover 的逻辑坐标系即甲板坐标系，移液器位置指吸头末端。

use crate::config::PlannerConfig;
use crate::error::PipettingError;
use ot_driver::{Driver, MoveOptions, Mover};
use ot_liquid::Well;
use ot_pose::{FrameGraph, Point};
use tracing::{debug, trace};

/// 体积比较容差（µL）
const VOLUME_EPSILON: f64 = 1e-9;

/// 位置比较容差（mm）
const POSITION_EPSILON: f64 = 1e-6;

/// 移动方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStyle {
    /// 升到行进高度、水平移动、再下降
    Arc,
    /// 直线移动
    Direct,
}

/// 流速（µL/s）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowRates {
    pub aspirate: f64,
    pub dispense: f64,
    pub blow_out: f64,
}

impl Default for FlowRates {
    fn default() -> Self {
        FlowRates {
            aspirate: 150.0,
            dispense: 600.0,
            blow_out: 80.0,
        }
    }
}

/// 移液器
#[derive(Debug)]
pub struct Pipette<D: Driver> {
    mover: Mover<D>,
    pipette_volume: u32,
    channels: usize,
    tip_volume: Option<u32>,
    current_volume: f64,
    air_gap: f64,
    flow_rates: FlowRates,
    default_speed: Option<f64>,
    config: PlannerConfig,
}

impl<D: Driver> Pipette<D> {
    /// 创建移液器
    ///
    /// `channels` 只能是 1、8 或 96。
    pub fn new(
        mover: Mover<D>,
        pipette_volume: u32,
        channels: usize,
        config: PlannerConfig,
    ) -> Result<Self, PipettingError> {
        if !matches!(channels, 1 | 8 | 96) {
            return Err(PipettingError::ContractViolation(format!(
                "unsupported channel count {}",
                channels
            )));
        }
        if pipette_volume == 0 {
            return Err(PipettingError::ContractViolation(
                "pipette volume must be positive".into(),
            ));
        }
        config.validate()?;
        Ok(Pipette {
            mover,
            pipette_volume,
            channels,
            tip_volume: None,
            current_volume: 0.0,
            air_gap: 0.0,
            flow_rates: FlowRates::default(),
            default_speed: None,
            config,
        })
    }

    pub fn mover(&self) -> &Mover<D> {
        &self.mover
    }

    pub fn mover_mut(&mut self) -> &mut Mover<D> {
        &mut self.mover
    }

    pub fn into_mover(self) -> Mover<D> {
        self.mover
    }

    /// 移液器量程（µL）
    pub fn pipette_volume(&self) -> u32 {
        self.pipette_volume
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// 已安装吸头的量程
    pub fn tip_volume(&self) -> Option<u32> {
        self.tip_volume
    }

    /// 安装吸头
    pub fn attach_tip(&mut self, tip_volume: u32) -> Result<(), PipettingError> {
        if tip_volume == 0 {
            return Err(PipettingError::ContractViolation(
                "tip volume must be positive".into(),
            ));
        }
        debug!(pipette = self.pipette_volume, tip = tip_volume, "Attached tip");
        self.tip_volume = Some(tip_volume);
        Ok(())
    }

    /// 卸下吸头，吸头中必须没有液体
    pub fn remove_tip(&mut self) -> Result<(), PipettingError> {
        if self.current_volume > VOLUME_EPSILON {
            return Err(PipettingError::ContractViolation(format!(
                "cannot remove a tip holding {} uL",
                self.current_volume
            )));
        }
        self.tip_volume = None;
        Ok(())
    }

    /// 当前可用最大体积：吸头与移液器量程中较小者
    pub fn max_volume(&self) -> f64 {
        let pipette = f64::from(self.pipette_volume);
        match self.tip_volume {
            Some(tip) => pipette.min(f64::from(tip)),
            None => pipette,
        }
    }

    /// 吸头中的体积（µL，含空气间隙）
    pub fn current_volume(&self) -> f64 {
        self.current_volume
    }

    /// 吸头中的空气间隙（µL），包含在 `current_volume` 中
    pub fn air_gap(&self) -> f64 {
        self.air_gap
    }

    pub fn flow_rates(&self) -> FlowRates {
        self.flow_rates
    }

    pub fn set_flow_rates(&mut self, flow_rates: FlowRates) {
        self.flow_rates = flow_rates;
    }

    /// 未指定速度时的移动速度
    pub fn default_speed(&self) -> Option<f64> {
        self.default_speed
    }

    pub fn set_default_speed(&mut self, speed: Option<f64>) {
        self.default_speed = speed;
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PlannerConfig) -> Result<(), PipettingError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// 当前位置（甲板坐标系）
    pub fn position(&self, graph: &FrameGraph) -> Result<Point, PipettingError> {
        Ok(self.mover.current_position(graph)?)
    }

    /// 孔底上方 `height` 处的点（甲板坐标系）
    pub fn well_bottom(&self, graph: &FrameGraph, well: &Well, height: f64) -> Result<Point, PipettingError> {
        Ok(graph.change_base(Point::new(0.0, 0.0, height), well.id(), self.mover.src())?)
    }

    /// 孔口中心（甲板坐标系）
    pub fn well_top(&self, graph: &FrameGraph, well: &Well) -> Result<Point, PipettingError> {
        self.well_bottom(graph, well, well.depth())
    }

    /// 弧线移动的行进高度
    ///
    /// 取最低行进高度、甲板最高物体 + 余量、当前高度、目标高度中的最大值。
    pub fn travel_height(&self, graph: &FrameGraph, current: Point, target: Point) -> Result<f64, PipettingError> {
        let deck = self.mover.src();
        let deck_max = graph.max_z_in_subtree(deck)? - graph.position(deck)?.z;
        Ok(self
            .config
            .min_travel_height
            .max(deck_max + self.config.travel_clearance)
            .max(current.z)
            .max(target.z))
    }

    /// 移动到甲板坐标系中的 `target`
    ///
    /// `speed` 只作用于最后一段（直线移动时即整段），其余段使用默认速度。
    pub fn move_to(
        &mut self,
        graph: &mut FrameGraph,
        target: Point,
        style: MoveStyle,
        speed: Option<f64>,
    ) -> Result<Point, PipettingError> {
        if !target.is_finite() {
            return Err(PipettingError::ContractViolation(format!(
                "non-finite move target {}",
                target
            )));
        }
        let default = MoveOptions {
            low_power_z: false,
            speed: self.default_speed,
        };
        let last = MoveOptions {
            low_power_z: false,
            speed: speed.or(self.default_speed),
        };

        if style == MoveStyle::Arc {
            let current = self.position(graph)?;
            let lateral = Point::new(target.x - current.x, target.y - current.y, 0.0);
            // 水平位置不变时弧线退化为直线
            if lateral.norm() > POSITION_EPSILON {
                let travel_z = self.travel_height(graph, current, target)?;
                trace!(%current, %target, travel_z, "Arc move");
                if travel_z - current.z > POSITION_EPSILON {
                    self.move_leg(graph, Point::new(current.x, current.y, travel_z), default)?;
                }
                self.move_leg(graph, Point::new(target.x, target.y, travel_z), default)?;
            }
        }
        self.move_leg(graph, target, last)?;
        Ok(target)
    }

    fn move_leg(&mut self, graph: &mut FrameGraph, point: Point, options: MoveOptions) -> Result<(), PipettingError> {
        self.mover
            .move_to(graph, Some(point.x), Some(point.y), Some(point.z), options)?;
        Ok(())
    }

    /// 准备吸液（幂等）
    pub fn prepare_for_aspirate(&mut self) -> Result<(), PipettingError> {
        self.mover.driver_mut().prepare_for_aspirate()?;
        Ok(())
    }

    /// 以当前吸液流速吸液
    pub fn aspirate(&mut self, volume: f64) -> Result<(), PipettingError> {
        self.aspirate_at(volume, self.flow_rates.aspirate)
    }

    /// 以指定流速吸液
    pub fn aspirate_at(&mut self, volume: f64, rate: f64) -> Result<(), PipettingError> {
        check_volume(volume)?;
        if self.current_volume + volume > self.max_volume() + VOLUME_EPSILON {
            return Err(PipettingError::ContractViolation(format!(
                "cannot aspirate {} uL: tip holds {} of {} uL",
                volume,
                self.current_volume,
                self.max_volume()
            )));
        }
        self.mover.driver_mut().aspirate(volume, rate)?;
        self.current_volume += volume;
        debug!(volume, rate, current = self.current_volume, "Aspirated");
        Ok(())
    }

    /// 吸入空气间隙，计入吸头体积并单独记账
    pub fn aspirate_air_gap(&mut self, volume: f64, rate: f64) -> Result<(), PipettingError> {
        self.aspirate_at(volume, rate)?;
        self.air_gap += volume;
        Ok(())
    }

    /// 以当前排液流速排液，`None` 表示排空
    pub fn dispense(&mut self, volume: Option<f64>) -> Result<(), PipettingError> {
        self.dispense_at(volume, self.flow_rates.dispense)
    }

    /// 以指定流速排液，`None` 表示排空
    pub fn dispense_at(&mut self, volume: Option<f64>, rate: f64) -> Result<(), PipettingError> {
        let volume = volume.unwrap_or(self.current_volume);
        check_volume(volume)?;
        if volume > self.current_volume + VOLUME_EPSILON {
            return Err(PipettingError::ContractViolation(format!(
                "cannot dispense {} uL: tip holds {} uL",
                volume, self.current_volume
            )));
        }
        self.mover.driver_mut().dispense(volume, rate)?;
        self.current_volume = (self.current_volume - volume).max(0.0);
        // 空气间隙位于吸头最上方，最后排出
        self.air_gap = self.air_gap.min(self.current_volume);
        debug!(volume, rate, current = self.current_volume, "Dispensed");
        Ok(())
    }

    /// 吹出
    pub fn blow_out(&mut self) -> Result<(), PipettingError> {
        self.mover.driver_mut().blow_out()?;
        self.current_volume = 0.0;
        self.air_gap = 0.0;
        debug!("Blew out");
        Ok(())
    }

    /// 柱塞越过底部继续推出
    pub fn push_out(&mut self, volume: f64) -> Result<(), PipettingError> {
        check_volume(volume)?;
        self.mover.driver_mut().push_out(volume)?;
        self.current_volume = 0.0;
        self.air_gap = 0.0;
        debug!(volume, "Pushed out");
        Ok(())
    }

    /// 阻塞等待
    pub fn delay(&mut self, seconds: f64) -> Result<(), PipettingError> {
        self.mover.delay(seconds)?;
        Ok(())
    }
}

fn check_volume(volume: f64) -> Result<(), PipettingError> {
    if !volume.is_finite() || volume < 0.0 {
        return Err(PipettingError::ContractViolation(format!(
            "volume must be a non-negative finite amount, got {}",
            volume
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ot_driver::{AxisId, AxisMapping, DriverCommand, SimulatedDriver};
    use ot_liquid::{GridSpec, Labware, LabwareKind, WellShape};
    use ot_pose::ObjectId;

    struct Rig {
        graph: FrameGraph,
        plate: Labware,
        pipette: Pipette<SimulatedDriver>,
    }

    fn rig() -> Rig {
        let mut graph = FrameGraph::new();
        let deck = ObjectId::new();
        let machine = ObjectId::new();
        graph.create_root_object(deck, 0.0, 0.0, 0.0).unwrap();
        graph.create_root_object(machine, 0.0, 0.0, 0.0).unwrap();

        let plate = Labware::grid(
            "plate_96",
            LabwareKind::Plate,
            GridSpec {
                rows: 8,
                columns: 12,
                depth: 10.0,
                shape: WellShape::Circular { diameter: 6.0 },
                a1_offset: Point::new(10.0, 70.0, 2.0),
                column_spacing: 9.0,
                row_spacing: 9.0,
            },
        );
        plate.track(&mut graph, deck, 100.0, 0.0, 0.0).unwrap();

        let mapping = AxisMapping::from_letters(&[('x', 'X'), ('y', 'Y'), ('z', 'Z')]).unwrap();
        let mover = Mover::new(SimulatedDriver::new(), mapping, deck, machine);
        graph.create_root_object(mover.id(), 0.0, 0.0, 100.0).unwrap();
        let pipette = Pipette::new(mover, 1000, 1, PlannerConfig::default()).unwrap();
        Rig {
            graph,
            plate,
            pipette,
        }
    }

    fn moves(pipette: &Pipette<SimulatedDriver>) -> Vec<(f64, f64, f64)> {
        pipette
            .mover()
            .driver()
            .commands()
            .iter()
            .filter_map(|c| match c {
                DriverCommand::Move { targets, .. } => Some((
                    targets[&AxisId::X],
                    targets[&AxisId::Y],
                    targets[&AxisId::Z],
                )),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_rejects_bad_channel_count() {
        let mapping = AxisMapping::from_letters(&[('z', 'Z')]).unwrap();
        let mover = Mover::new(SimulatedDriver::new(), mapping, ObjectId::new(), ObjectId::new());
        assert!(matches!(
            Pipette::new(mover, 1000, 4, PlannerConfig::default()),
            Err(PipettingError::ContractViolation(_))
        ));
    }

    #[test]
    fn test_well_locations() {
        let rig = rig();
        let a1 = rig.plate.well("A1").unwrap();
        let bottom = rig.pipette.well_bottom(&rig.graph, a1, 1.5).unwrap();
        assert!(bottom.approx_eq(&Point::new(110.0, 70.0, 3.5), 1e-9));
        let top = rig.pipette.well_top(&rig.graph, a1).unwrap();
        assert!(top.approx_eq(&Point::new(110.0, 70.0, 12.0), 1e-9));
    }

    #[test]
    fn test_direct_move_is_single_leg() {
        let mut rig = rig();
        rig.pipette
            .move_to(&mut rig.graph, Point::new(5.0, 6.0, 7.0), MoveStyle::Direct, Some(3.0))
            .unwrap();
        assert_eq!(moves(&rig.pipette), vec![(5.0, 6.0, 7.0)]);
        match &rig.pipette.mover().driver().commands()[0] {
            DriverCommand::Move { options, .. } => assert_eq!(options.speed, Some(3.0)),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_arc_move_rises_travels_descends() {
        let mut rig = rig();
        rig.pipette
            .move_to(&mut rig.graph, Point::new(0.0, 0.0, 5.0), MoveStyle::Direct, None)
            .unwrap();
        let a1 = rig.plate.well("A1").unwrap();
        let top = rig.pipette.well_top(&rig.graph, a1).unwrap();
        rig.pipette
            .move_to(&mut rig.graph, top, MoveStyle::Arc, None)
            .unwrap();

        // 甲板最高点是孔口 12 mm，加 10 mm 余量
        let legs = moves(&rig.pipette);
        assert_eq!(legs.len(), 4);
        assert_eq!(legs[1], (0.0, 0.0, 22.0));
        assert_eq!(legs[2].2, 22.0);
        assert!((legs[3].0 - 110.0).abs() < 1e-9);
        let position = rig.pipette.position(&rig.graph).unwrap();
        assert!(position.approx_eq(&top, 1e-9));
    }

    #[test]
    fn test_arc_move_clears_tall_labware() {
        let mut rig = rig();
        let deck = rig.pipette.mover().src();
        let rack = Labware::grid(
            "tube_rack",
            LabwareKind::Plate,
            GridSpec {
                rows: 1,
                columns: 1,
                depth: 80.0,
                shape: WellShape::Circular { diameter: 28.0 },
                a1_offset: Point::new(20.0, 40.0, 1.0),
                column_spacing: 30.0,
                row_spacing: 30.0,
            },
        );
        rack.track(&mut rig.graph, deck, 40.0, 0.0, 0.0).unwrap();

        rig.pipette
            .move_to(&mut rig.graph, Point::new(0.0, 0.0, 5.0), MoveStyle::Direct, None)
            .unwrap();
        let a1 = rig.plate.well("A1").unwrap();
        let top = rig.pipette.well_top(&rig.graph, a1).unwrap();
        rig.pipette
            .move_to(&mut rig.graph, top, MoveStyle::Arc, None)
            .unwrap();

        // 管架孔口在 81 mm，水平移动必须在其上方留出余量
        let legs = moves(&rig.pipette);
        assert_eq!(legs[1], (0.0, 0.0, 91.0));
        assert_eq!(legs[2].2, 91.0);
        assert!(legs[3].0 > 100.0);
    }

    #[test]
    fn test_arc_move_respects_min_travel_height() {
        let mut rig = rig();
        let mut config = PlannerConfig::default();
        config.min_travel_height = 80.0;
        rig.pipette.set_config(config).unwrap();
        rig.pipette
            .move_to(&mut rig.graph, Point::new(10.0, 10.0, 20.0), MoveStyle::Arc, None)
            .unwrap();
        // 从 z=100 出发已高于行进高度，不需要上升
        let legs = moves(&rig.pipette);
        assert_eq!(legs, vec![(10.0, 10.0, 100.0), (10.0, 10.0, 20.0)]);
    }

    #[test]
    fn test_aspirate_dispense_volume_tracking() {
        let mut rig = rig();
        rig.pipette.attach_tip(200).unwrap();
        rig.pipette.prepare_for_aspirate().unwrap();
        rig.pipette.aspirate(150.0).unwrap();
        assert!(matches!(
            rig.pipette.aspirate(60.0),
            Err(PipettingError::ContractViolation(_))
        ));
        rig.pipette.dispense(Some(100.0)).unwrap();
        assert_eq!(rig.pipette.current_volume(), 50.0);
        rig.pipette.dispense(None).unwrap();
        assert_eq!(rig.pipette.current_volume(), 0.0);
        assert!(rig.pipette.dispense(Some(1.0)).is_err());
    }

    #[test]
    fn test_air_gap_is_dispensed_last() {
        let mut rig = rig();
        rig.pipette.attach_tip(200).unwrap();
        rig.pipette.prepare_for_aspirate().unwrap();
        rig.pipette.aspirate_air_gap(5.0, 100.0).unwrap();
        rig.pipette.aspirate(50.0).unwrap();
        assert_eq!(rig.pipette.current_volume(), 55.0);
        assert_eq!(rig.pipette.air_gap(), 5.0);

        rig.pipette.dispense(Some(50.0)).unwrap();
        assert_eq!(rig.pipette.air_gap(), 5.0);
        rig.pipette.dispense(Some(3.0)).unwrap();
        assert_eq!(rig.pipette.air_gap(), 2.0);
        rig.pipette.blow_out().unwrap();
        assert_eq!(rig.pipette.air_gap(), 0.0);
    }

    #[test]
    fn test_driver_failure_keeps_volume() {
        let mut rig = rig();
        rig.pipette.prepare_for_aspirate().unwrap();
        rig.pipette.mover_mut().driver_mut().fail_aspirate();
        assert!(matches!(
            rig.pipette.aspirate(10.0),
            Err(PipettingError::Driver(_))
        ));
        assert_eq!(rig.pipette.current_volume(), 0.0);
    }

    #[test]
    fn test_remove_tip_requires_empty() {
        let mut rig = rig();
        rig.pipette.attach_tip(50).unwrap();
        assert_eq!(rig.pipette.max_volume(), 50.0);
        rig.pipette.prepare_for_aspirate().unwrap();
        rig.pipette.aspirate(5.0).unwrap();
        assert!(rig.pipette.remove_tip().is_err());
        rig.pipette.blow_out().unwrap();
        rig.pipette.remove_tip().unwrap();
        assert_eq!(rig.pipette.tip_volume(), None);
    }
}
