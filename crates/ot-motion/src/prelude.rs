//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use ot_motion::prelude::*;
//! ```

// 会话与错误
pub use crate::ProtocolSession;
pub use crate::{ErrorKind, MotionError};

// 位姿
pub use ot_pose::{Axis, FrameGraph, ObjectId, Point};

// 驱动
pub use ot_driver::{AxisId, AxisMapping, Driver, MoveOptions, Mover};
#[cfg(feature = "mock")]
pub use ot_driver::{DriverCommand, SimulatedDriver};

// 液体
pub use ot_liquid::{
    GridSpec, Labware, LabwareKind, LabwareWell, LiquidTracker, VolumeChange, Well, WellId,
    WellShape,
};

// 移液
pub use ot_pipetting::{
    CycleCallbacks, CycleInfo, LiquidClassSettings, LiquidClassTable, Pipette, PipetteLiquidClass,
    PlannerConfig,
};
