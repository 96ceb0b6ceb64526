//! # ot-motion
//!
//! 移液机器人运动核心的统一入口。
//!
//! # 架构
//!
//! 从底层到高层：
//!
//! - **位姿层** (`pose`): 坐标、坐标系与层级位姿图
//! - **驱动层** (`driver`): 驱动能力接口、物理轴映射、`Mover`
//! - **液体层** (`liquid`): 耗材几何、体积/液面换算、液体账本
//! - **移液层** (`pipetting`): 液体类别参数、移液周期状态机
//!
//! 协议执行方通常只需要 [`ProtocolSession`] 和 [`prelude`]。
//!
//! # 快速开始
//!
//! ```rust
//! use ot_motion::driver::SimulatedDriver;
//! use ot_motion::prelude::*;
//!
//! ot_motion::init_logging();
//!
//! let mut session = ProtocolSession::new(PlannerConfig::default())?;
//! let reservoir = Labware::grid("reservoir_12", LabwareKind::Reservoir, GridSpec {
//!     rows: 1,
//!     columns: 12,
//!     depth: 40.0,
//!     shape: WellShape::Rectangular { width: 8.0, length: 70.0 },
//!     a1_offset: Point::new(14.0, 40.0, 2.0),
//!     column_spacing: 9.0,
//!     row_spacing: 0.0,
//! });
//! session.load_labware(&reservoir, 0.0, 0.0, 0.0)?;
//! let a1 = reservoir.target("A1")?;
//! session.liquids_mut().set_start_volume(a1.id(), 10_000.0)?;
//!
//! let mapping = AxisMapping::from_letters(&[('x', 'X'), ('y', 'Y'), ('z', 'Z')])?;
//! let mut p1000 = session.load_pipette(
//!     SimulatedDriver::new(),
//!     mapping,
//!     1000,
//!     8,
//!     Point::new(0.0, 0.0, 150.0),
//! )?;
//! p1000.pipette_mut().attach_tip(200)?;
//! session.apply_liquid_class(&mut p1000, 200, 50.0)?;
//! session.aspirate(&mut p1000, 50.0, a1)?;
//!
//! // 8 个通道共用一个储液槽孔
//! assert!((session.liquids().get_volume(a1.id())? - 9_600.0).abs() < 1e-6);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod logging;
mod session;

pub mod prelude;

pub use error::{MotionError, Result};
pub use logging::{DEFAULT_FILTER, init_logging, init_logging_with_filter};
pub use session::ProtocolSession;

pub use ot_pose::ErrorKind;

/// 位姿层
pub mod pose {
    pub use ot_pose::*;
}

/// 驱动层
pub mod driver {
    pub use ot_driver::*;
}

/// 液体层
pub mod liquid {
    pub use ot_liquid::*;
}

/// 移液层
pub mod pipetting {
    pub use ot_pipetting::*;
}
