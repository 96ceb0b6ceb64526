//! 驱动层错误类型定义

use crate::axis::AxisId;
use ot_pose::{Axis, ErrorKind, PoseError};
use thiserror::Error;

/// 驱动能力错误类型
///
/// 由 [`Driver`](crate::Driver) 实现返回，原样穿过 Mover 与移液状态机。
/// 本层不做重试。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// 运动失败（失步、限位等）
    #[error("Motion failed: {0}")]
    Motion(String),

    /// 与硬件通信失败
    #[error("Communication error: {0}")]
    Communication(String),

    /// 轴失步
    #[error("Axis {axis} stalled")]
    Stall {
        /// 失步的物理轴
        axis: AxisId,
    },

    /// 移液器动作失败（超出容量、未准备吸液等）
    #[error("Pipette error: {0}")]
    Pipette(String),

    /// 命令参数非法
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

impl DriverError {
    /// 错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::InvalidCommand(_) => ErrorKind::ContractViolation,
            _ => ErrorKind::Motion,
        }
    }
}

/// Mover 错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MoverError {
    /// 驱动错误
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 位姿图错误
    #[error("Pose error: {0}")]
    Pose(#[from] PoseError),

    /// 映射中的轴缺少目标值
    #[error("Missing target for mapped axis '{axis}'")]
    MissingAxisValue {
        /// 逻辑轴
        axis: Axis,
    },

    /// 轴不在映射中
    #[error("Axis '{axis}' is not in the axis mapping")]
    UnmappedAxis {
        /// 逻辑轴
        axis: Axis,
    },

    /// 目标值不是有限数
    #[error("Non-finite target {value} for axis '{axis}'")]
    InvalidTarget {
        /// 逻辑轴
        axis: Axis,
        /// 目标值
        value: f64,
    },

    /// 轴映射不合法
    #[error("Invalid axis mapping: {0}")]
    InvalidMapping(String),
}

impl MoverError {
    /// 错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            MoverError::Driver(e) => e.kind(),
            MoverError::Pose(e) => e.kind(),
            MoverError::MissingAxisValue { .. }
            | MoverError::UnmappedAxis { .. }
            | MoverError::InvalidTarget { .. }
            | MoverError::InvalidMapping(_) => ErrorKind::ContractViolation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ot_pose::ObjectId;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::Stall { axis: AxisId::Z };
        assert_eq!(format!("{}", err), "Axis Z stalled");

        let err = DriverError::Motion("limit switch hit".to_string());
        assert!(format!("{}", err).contains("limit switch hit"));
    }

    #[test]
    fn test_from_driver_error() {
        let err: MoverError = DriverError::Communication("timeout".to_string()).into();
        match err {
            MoverError::Driver(DriverError::Communication(msg)) => assert_eq!(msg, "timeout"),
            _ => panic!("Expected Driver variant"),
        }
    }

    #[test]
    fn test_mover_error_kind() {
        assert_eq!(
            MoverError::MissingAxisValue { axis: Axis::Z }.kind(),
            ErrorKind::ContractViolation
        );
        assert_eq!(
            MoverError::Driver(DriverError::Motion("x".into())).kind(),
            ErrorKind::Motion
        );
        assert_eq!(
            MoverError::Pose(PoseError::NotTracked(ObjectId::new())).kind(),
            ErrorKind::NotTracked
        );
    }
}
