//! # ot-pose - 坐标系与位姿图
//!
//! 运动栈最底层：只负责"对象在哪里"，不接触任何硬件。
//!
//! ## 包含模块
//!
//! - `point` - 三维点与逻辑轴（毫米）
//! - `frame` - 4x4 齐次变换坐标系
//! - `graph` - 分层位姿图（子树平移传播）
//! - `error` - 错误类型与跨层错误分类

mod error;
mod frame;
mod graph;
mod id;
mod point;

pub use error::{ErrorKind, PoseError};
pub use frame::CoordinateFrame;
pub use graph::{FrameGraph, FrameNode};
pub use id::ObjectId;
pub use point::{Axis, Point};
