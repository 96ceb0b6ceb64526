//! 驱动层模块
//!
//! 本模块把真正的串口/CAN 硬件驱动抽象为一个能力接口，并提供：
//! - 物理轴标识与逻辑轴映射
//! - `Mover`：把逻辑坐标运动转换为物理轴命令并同步位姿图
//! - 模拟驱动（`mock` feature）：测试与空跑用
//!
//! # 使用场景
//!
//! 硬件初始化时为每个轴组（龙门、每个安装座）创建一个 `Mover`。
//! 移液规划层（`ot-pipetting`）通过移液器间接使用本模块。

mod axis;
mod driver;
mod error;
mod mover;

#[cfg(feature = "mock")]
pub mod mock;

pub use axis::{AxisId, AxisMapping, AxisPositions};
pub use driver::{Driver, MoveOptions, RealtimeClock, seconds_to_duration};
pub use error::{DriverError, MoverError};
pub use mover::Mover;

#[cfg(feature = "mock")]
pub use mock::{DriverCommand, SimulatedDriver};
