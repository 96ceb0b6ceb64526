//! 协议会话
//!
//! 一次协议运行拥有的全部可变状态：位姿图、液体账本、规划器配置和液体类别表。
//! 会话由调用方显式创建并以 `&mut` 传递，不存在全局状态，
//! 测试之间互不影响。

use crate::error::{MotionError, Result};
use ot_driver::{AxisMapping, Driver, Mover};
use ot_liquid::{Labware, LabwareWell, LiquidTracker};
use ot_pipetting::{LiquidClassTable, Pipette, PipetteLiquidClass, PlannerConfig};
use ot_pose::{FrameGraph, ObjectId, Point};
use std::path::Path;
use tracing::{debug, info};

/// 协议会话
///
/// 移液器在位姿图中是独立的根对象，其位置即驱动坐标；
/// 耗材挂在甲板坐标系下。
#[derive(Debug, Clone)]
pub struct ProtocolSession {
    graph: FrameGraph,
    liquids: LiquidTracker,
    config: PlannerConfig,
    liquid_classes: LiquidClassTable,
    deck: ObjectId,
    machine: ObjectId,
    machine_offset: Point,
}

impl ProtocolSession {
    /// 创建会话，使用内置液体类别表
    ///
    /// 甲板坐标系与驱动坐标系原点重合。
    pub fn new(config: PlannerConfig) -> Result<Self> {
        config.validate()?;
        let mut session = ProtocolSession {
            graph: FrameGraph::new(),
            liquids: LiquidTracker::new(),
            config,
            liquid_classes: LiquidClassTable::builtin(),
            deck: ObjectId::new(),
            machine: ObjectId::new(),
            machine_offset: Point::ZERO,
        };
        session.create_frames()?;
        Ok(session)
    }

    /// 从 TOML 配置文件创建会话
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = PlannerConfig::load_from_file(path)?;
        Self::new(config)
    }

    /// 设置驱动坐标系原点在甲板坐标系中的位置（校准偏移）
    pub fn with_machine_offset(mut self, offset: Point) -> Result<Self> {
        self.graph.update_position(self.machine, offset)?;
        self.machine_offset = offset;
        Ok(self)
    }

    fn create_frames(&mut self) -> Result<()> {
        let offset = self.machine_offset;
        self.graph.create_root_object(self.deck, 0.0, 0.0, 0.0)?;
        self.graph
            .create_root_object(self.machine, offset.x, offset.y, offset.z)?;
        debug!(deck = %self.deck, machine = %self.machine, %offset, "Created session frames");
        Ok(())
    }

    /// 甲板坐标系
    pub fn deck(&self) -> ObjectId {
        self.deck
    }

    /// 驱动坐标系
    pub fn machine(&self) -> ObjectId {
        self.machine
    }

    pub fn graph(&self) -> &FrameGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut FrameGraph {
        &mut self.graph
    }

    pub fn liquids(&self) -> &LiquidTracker {
        &self.liquids
    }

    pub fn liquids_mut(&mut self) -> &mut LiquidTracker {
        &mut self.liquids
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn liquid_classes(&self) -> &LiquidClassTable {
        &self.liquid_classes
    }

    /// 替换液体类别表
    pub fn set_liquid_classes(&mut self, table: LiquidClassTable) {
        self.liquid_classes = table;
    }

    /// 从 TOML 文件加载液体类别表
    pub fn load_liquid_classes<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.liquid_classes = LiquidClassTable::load_from_file(path)?;
        Ok(())
    }

    /// 把耗材放到甲板 `(x, y, z)` 处并登记其中的孔
    pub fn load_labware(&mut self, labware: &Labware, x: f64, y: f64, z: f64) -> Result<usize> {
        labware.track(&mut self.graph, self.deck, x, y, z)?;
        let wells = self.liquids.init_labware(labware)?;
        info!(labware = %labware.load_name(), wells, "Loaded labware");
        Ok(wells)
    }

    /// 创建移液器并注册到位姿图
    ///
    /// `position` 是移液器当前在驱动坐标系中的位置（通常为回零位置）。
    pub fn load_pipette<D: Driver>(
        &mut self,
        driver: D,
        axis_mapping: AxisMapping,
        pipette_volume: u32,
        channels: usize,
        position: Point,
    ) -> Result<PipetteLiquidClass<D>> {
        let mover = Mover::new(driver, axis_mapping, self.deck, self.machine);
        let pipette = Pipette::new(mover, pipette_volume, channels, self.config)?;
        self.graph
            .create_root_object(pipette.mover().id(), position.x, position.y, position.z)?;
        info!(pipette = pipette_volume, channels, "Loaded pipette");
        Ok(PipetteLiquidClass::new(pipette))
    }

    /// 按当前液体类别表为 `tip` / `volume` 选择参数
    pub fn apply_liquid_class<D: Driver>(
        &self,
        pipette: &mut PipetteLiquidClass<D>,
        tip: u32,
        volume: f64,
    ) -> Result<()> {
        pipette.apply_liquid_class(&self.liquid_classes, tip, volume)?;
        Ok(())
    }

    /// 吸液，成功后提交账本
    pub fn aspirate<D: Driver>(
        &mut self,
        pipette: &mut PipetteLiquidClass<D>,
        volume: f64,
        target: LabwareWell<'_>,
    ) -> Result<()> {
        pipette
            .aspirate(&mut self.graph, volume, target, &mut self.liquids)
            .map_err(MotionError::from)
    }

    /// 排液，成功后提交账本
    pub fn dispense<D: Driver>(
        &mut self,
        pipette: &mut PipetteLiquidClass<D>,
        volume: f64,
        target: LabwareWell<'_>,
    ) -> Result<()> {
        pipette
            .dispense(&mut self.graph, volume, target, &mut self.liquids)
            .map_err(MotionError::from)
    }

    /// 设置说明
    pub fn setup_instructions(&self) -> String {
        self.liquids.setup_instructions()
    }

    /// 清空位姿图和液体账本，保留配置与液体类别表
    ///
    /// 之前创建的移液器不再有效，需要重新加载。
    pub fn reset(&mut self) -> Result<()> {
        self.graph.clear_all();
        self.liquids.reset();
        self.create_frames()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ot_driver::SimulatedDriver;
    use ot_liquid::{GridSpec, LabwareKind, WellShape};

    fn plate() -> Labware {
        Labware::grid(
            "plate_96",
            LabwareKind::Plate,
            GridSpec {
                rows: 8,
                columns: 12,
                depth: 10.0,
                shape: WellShape::Circular { diameter: 7.0 },
                a1_offset: Point::new(14.0, 74.0, 1.0),
                column_spacing: 9.0,
                row_spacing: 9.0,
            },
        )
    }

    fn xyz() -> AxisMapping {
        AxisMapping::from_letters(&[('x', 'X'), ('y', 'Y'), ('z', 'Z')]).unwrap()
    }

    #[test]
    fn test_load_labware() {
        let mut session = ProtocolSession::new(PlannerConfig::default()).unwrap();
        let plate = plate();
        assert_eq!(session.load_labware(&plate, 100.0, 0.0, 0.0).unwrap(), 96);
        let a1 = plate.well("A1").unwrap();
        assert!(session
            .graph()
            .position(a1.id())
            .unwrap()
            .approx_eq(&Point::new(114.0, 74.0, 1.0), 1e-9));
        assert!(session.liquids().contains(a1.id()));

        let err = session.load_labware(&plate, 0.0, 0.0, 0.0).unwrap_err();
        assert_eq!(err.kind(), ot_pose::ErrorKind::AlreadyTracked);
    }

    #[test]
    fn test_machine_offset() {
        let mut session = ProtocolSession::new(PlannerConfig::default())
            .unwrap()
            .with_machine_offset(Point::new(0.0, 0.0, -20.0))
            .unwrap();
        let mut pipette = session
            .load_pipette(SimulatedDriver::new(), xyz(), 1000, 1, Point::new(0.0, 0.0, 120.0))
            .unwrap();
        let position = pipette.pipette().position(session.graph()).unwrap();
        assert!(position.approx_eq(&Point::new(0.0, 0.0, 100.0), 1e-9));

        pipette
            .pipette_mut()
            .move_to(
                session.graph_mut(),
                Point::new(10.0, 10.0, 50.0),
                ot_pipetting::MoveStyle::Direct,
                None,
            )
            .unwrap();
        let driver = pipette.pipette().mover().driver();
        assert_relative_eq!(driver.position(ot_driver::AxisId::Z), 70.0);
    }

    #[test]
    fn test_transfer_through_session() {
        let mut session = ProtocolSession::new(PlannerConfig::default()).unwrap();
        let plate = plate();
        session.load_labware(&plate, 0.0, 0.0, 0.0).unwrap();
        let a1 = plate.target("A1").unwrap();
        let b1 = plate.target("B1").unwrap();
        session.liquids_mut().set_start_volume(a1.id(), 200.0).unwrap();
        session.liquids_mut().set_liquid_name(a1.id(), "Water").unwrap();

        let mut pipette = session
            .load_pipette(SimulatedDriver::new(), xyz(), 1000, 1, Point::new(0.0, 0.0, 100.0))
            .unwrap();
        pipette.pipette_mut().attach_tip(200).unwrap();
        session.apply_liquid_class(&mut pipette, 200, 50.0).unwrap();

        session.aspirate(&mut pipette, 50.0, a1).unwrap();
        session.dispense(&mut pipette, 50.0, b1).unwrap();
        assert_relative_eq!(session.liquids().get_volume(a1.id()).unwrap(), 150.0);
        assert_relative_eq!(session.liquids().get_volume(b1.id()).unwrap(), 50.0);
        assert!(session.setup_instructions().contains("Water -> 150 uL -> A1 of plate_96"));
    }

    #[test]
    fn test_reset() {
        let mut session = ProtocolSession::new(PlannerConfig::default()).unwrap();
        let plate = plate();
        session.load_labware(&plate, 0.0, 0.0, 0.0).unwrap();
        session.reset().unwrap();
        assert!(session.liquids().is_empty());
        assert_eq!(session.graph().len(), 2);
        session.load_labware(&plate, 0.0, 0.0, 0.0).unwrap();
    }

    #[test]
    fn test_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("planner.toml");
        std::fs::write(&path, "travel_clearance = 25.0\n").unwrap();
        let session = ProtocolSession::from_config_file(&path).unwrap();
        assert_eq!(session.config().travel_clearance, 25.0);

        let err = ProtocolSession::from_config_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(err.is_caller_input());
    }
}
