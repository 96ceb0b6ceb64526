//! # ot-pipetting
//!
//! 液体类别驱动的吸液/排液规划：
//! - 液体类别参数、内置参数表与按体积插值
//! - 规划器配置（TOML）
//! - 由液面推导移液高度
//! - `Pipette`：移液器状态与弧线/直线移动
//! - `LiquidSettingsRunner`：单次周期状态机
//! - `PipetteLiquidClass`：协议步骤的入口，负责账本提交
//!
//! ## 示例
//!
//! ```rust
//! use ot_driver::{AxisMapping, Mover, SimulatedDriver};
//! use ot_liquid::{GridSpec, Labware, LabwareKind, LiquidTracker, WellShape};
//! use ot_pipetting::{Pipette, PipetteLiquidClass, PlannerConfig};
//! use ot_pose::{FrameGraph, ObjectId, Point};
//!
//! let mut graph = FrameGraph::new();
//! let deck = ObjectId::new();
//! graph.create_root_object(deck, 0.0, 0.0, 0.0)?;
//!
//! let plate = Labware::grid("plate_96", LabwareKind::Plate, GridSpec {
//!     rows: 8,
//!     columns: 12,
//!     depth: 10.0,
//!     shape: WellShape::Circular { diameter: 7.0 },
//!     a1_offset: Point::new(14.0, 74.0, 1.0),
//!     column_spacing: 9.0,
//!     row_spacing: 9.0,
//! });
//! plate.track(&mut graph, deck, 0.0, 0.0, 0.0)?;
//! let mut tracker = LiquidTracker::new();
//! tracker.init_labware(&plate)?;
//! let a1 = plate.target("A1")?;
//! tracker.set_start_volume(a1.id(), 200.0)?;
//!
//! let mapping = AxisMapping::from_letters(&[('x', 'X'), ('y', 'Y'), ('z', 'Z')])?;
//! let mover = Mover::new(SimulatedDriver::new(), mapping, deck, deck);
//! graph.create_root_object(mover.id(), 0.0, 0.0, 100.0)?;
//! let mut pipette = Pipette::new(mover, 1000, 1, PlannerConfig::default())?;
//! pipette.attach_tip(200)?;
//!
//! let mut lc = PipetteLiquidClass::new(pipette);
//! lc.aspirate(&mut graph, 50.0, a1, &mut tracker)?;
//! assert!((tracker.get_volume(a1.id())? - 150.0).abs() < 1e-9);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod error;
mod heights;
mod liquid_class;
mod pipette;
mod runner;
mod settings;
mod table;
mod timestamps;

pub use config::{LABWARE_BOTTOM_CLEARANCE, PlannerConfig, TipSpeeds};
pub use error::PipettingError;
pub use heights::{LiquidSurfaceHeights, PipettingHeights};
pub use liquid_class::{CycleCallbacks, PipetteLiquidClass};
pub use pipette::{FlowRates, MoveStyle, Pipette};
pub use runner::{CycleCallback, CycleInfo, CyclePlan, LiquidSettingsRunner, PipettingStep};
pub use settings::{
    AirGapSettings, AspirateSettings, BlowOutSettings, DispenseSettings, LiquidClassSettings,
    RetractSettings, SubmergeSettings, TraverseSettings,
};
pub use table::{LiquidClassTable, TipLiquidClass, VolumePoint};
pub use timestamps::{CycleEvent, SampleTimestamps, current_time_us};

#[cfg(feature = "mock")]
pub use ot_driver::{DriverCommand, SimulatedDriver};
