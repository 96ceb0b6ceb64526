//! 移液规划错误类型定义

use ot_driver::{DriverError, MoverError};
use ot_liquid::LiquidError;
use ot_pose::{ErrorKind, PoseError};
use thiserror::Error;

/// 移液规划错误类型
///
/// 下层错误原样包裹，不做重试也不做补偿。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipettingError {
    /// 液体账本错误（越界、未注册、体积未知）
    #[error("Liquid error: {0}")]
    Liquid(#[from] LiquidError),

    /// 轴组运动错误
    #[error("Mover error: {0}")]
    Mover(#[from] MoverError),

    /// 驱动错误（吸液、排液、吹出）
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 位姿图错误
    #[error("Pose error: {0}")]
    Pose(#[from] PoseError),

    /// 没有匹配的液体类别
    #[error("No liquid class for P{pipette} with T{tip} tips")]
    ConfigurationMissing {
        /// 移液器量程（µL）
        pipette: u32,
        /// 吸头量程（µL）
        tip: u32,
    },

    /// 配置解析或读写失败
    #[error("Config error: {0}")]
    Config(String),

    /// 配置值不合法
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    /// 调用约定被违反
    #[error("Contract violation: {0}")]
    ContractViolation(String),
}

impl PipettingError {
    /// 错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipettingError::Liquid(e) => e.kind(),
            PipettingError::Mover(e) => e.kind(),
            PipettingError::Driver(e) => e.kind(),
            PipettingError::Pose(e) => e.kind(),
            PipettingError::ConfigurationMissing { .. }
            | PipettingError::Config(_)
            | PipettingError::InvalidSetting(_) => ErrorKind::ConfigurationMissing,
            PipettingError::ContractViolation(_) => ErrorKind::ContractViolation,
        }
    }
}
