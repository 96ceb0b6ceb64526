//! 位姿层错误类型定义

use crate::ObjectId;
use std::fmt;
use thiserror::Error;

/// 错误分类
///
/// 所有层（位姿、驱动、液体、移液）共用的封闭错误类别集合。
/// 调用方据此区分"调用方输入问题"与"内部缺陷"。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 对象未被跟踪（查找失败）
    NotTracked,
    /// 对象重复注册
    AlreadyTracked,
    /// 体积或高度超出物理范围
    OutOfRange,
    /// 值的类型/形状不合法（如非有限坐标、非单调查找表）
    TypeMismatch,
    /// 找不到匹配的配置
    ConfigurationMissing,
    /// 调用约定被违反（编程错误）
    ContractViolation,
    /// 孔的体积记录已失效
    VolumeUnknown,
    /// 运动/通信错误（来自驱动）
    Motion,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotTracked => "not-tracked",
            ErrorKind::AlreadyTracked => "already-tracked",
            ErrorKind::OutOfRange => "out-of-range",
            ErrorKind::TypeMismatch => "type-mismatch",
            ErrorKind::ConfigurationMissing => "configuration-missing",
            ErrorKind::ContractViolation => "contract-violation",
            ErrorKind::VolumeUnknown => "volume-unknown",
            ErrorKind::Motion => "motion",
        };
        f.write_str(name)
    }
}

/// 位姿图错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoseError {
    /// 对象未被跟踪
    #[error("Object {0} is not tracked")]
    NotTracked(ObjectId),

    /// 父对象未被跟踪
    #[error("Parent {parent} of object {object} is not tracked")]
    ParentNotTracked {
        /// 父对象
        parent: ObjectId,
        /// 待注册的子对象
        object: ObjectId,
    },

    /// 对象已被跟踪（不允许重复创建或重新挂载）
    #[error("Object {0} is already tracked")]
    AlreadyTracked(ObjectId),

    /// 坐标不是有限值
    #[error("Invalid pose for object {object}: {reason}")]
    InvalidPose {
        /// 目标对象
        object: ObjectId,
        /// 原因
        reason: String,
    },

    /// 变换矩阵不可逆
    #[error("Frame of object {0} is not invertible")]
    Singular(ObjectId),
}

impl PoseError {
    /// 错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoseError::NotTracked(_) | PoseError::ParentNotTracked { .. } => ErrorKind::NotTracked,
            PoseError::AlreadyTracked(_) => ErrorKind::AlreadyTracked,
            PoseError::InvalidPose { .. } | PoseError::Singular(_) => ErrorKind::TypeMismatch,
        }
    }
}
