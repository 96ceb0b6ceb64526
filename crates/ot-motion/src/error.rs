//! 统一错误类型

use ot_driver::{DriverError, MoverError};
use ot_liquid::LiquidError;
use ot_pipetting::PipettingError;
use ot_pose::{ErrorKind, PoseError};
use thiserror::Error;

/// 运动栈错误
///
/// 汇总各层错误，按 [`ErrorKind`] 分类：
///
/// ```rust
/// use ot_motion::{ErrorKind, MotionError};
/// use ot_pose::{ObjectId, PoseError};
///
/// let err: MotionError = PoseError::NotTracked(ObjectId::new()).into();
/// assert_eq!(err.kind(), ErrorKind::NotTracked);
/// assert!(err.is_caller_input());
/// assert!(!err.is_motion());
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    /// 位姿图错误
    #[error(transparent)]
    Pose(#[from] PoseError),

    /// 驱动错误
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// 轴组运动错误
    #[error(transparent)]
    Mover(#[from] MoverError),

    /// 液体账本错误
    #[error(transparent)]
    Liquid(#[from] LiquidError),

    /// 移液规划错误
    #[error(transparent)]
    Pipetting(#[from] PipettingError),
}

impl MotionError {
    /// 错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            MotionError::Pose(e) => e.kind(),
            MotionError::Driver(e) => e.kind(),
            MotionError::Mover(e) => e.kind(),
            MotionError::Liquid(e) => e.kind(),
            MotionError::Pipetting(e) => e.kind(),
        }
    }

    /// 是否为编程错误（调用约定被违反）
    pub fn is_contract_violation(&self) -> bool {
        self.kind() == ErrorKind::ContractViolation
    }

    /// 是否为调用方输入问题
    ///
    /// 协议编写错误（超量吸液、未加载的孔、缺失的液体类别等），
    /// 修改协议后可以重新运行。
    pub fn is_caller_input(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotTracked
                | ErrorKind::AlreadyTracked
                | ErrorKind::OutOfRange
                | ErrorKind::TypeMismatch
                | ErrorKind::ConfigurationMissing
                | ErrorKind::VolumeUnknown
        )
    }

    /// 是否为运动/通信错误
    pub fn is_motion(&self) -> bool {
        self.kind() == ErrorKind::Motion
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, MotionError>;
