//! 液体跟踪错误类型定义

use crate::WellId;
use ot_pose::ErrorKind;
use thiserror::Error;

/// 液体跟踪错误类型
///
/// 越界错误刻意不做截断：吸取超过孔内现有体积之类的协议错误必须尽早暴露，
/// 而不是悄悄算出错误的液面。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LiquidError {
    /// 孔未初始化
    #[error("Well {0} is not tracked, call init_well_liquid_height first")]
    NotTracked(WellId),

    /// 体积超出范围
    #[error("Volume {volume:.3} uL is out of range [0, {max:.3}]")]
    VolumeOutOfRange {
        /// 请求的体积
        volume: f64,
        /// 孔最大体积
        max: f64,
    },

    /// 高度超出范围
    #[error("Height {height:.3} mm is out of range [0, {depth:.3}]")]
    HeightOutOfRange {
        /// 请求的高度
        height: f64,
        /// 孔深度
        depth: f64,
    },

    /// 查找表不合法
    #[error("Invalid lookup table: {0}")]
    InvalidLookupTable(String),

    /// 孔几何不合法
    #[error("Invalid well geometry: {0}")]
    InvalidGeometry(String),

    /// 孔的体积记录已失效（上一次移液周期中途失败）
    #[error("Volume of well {0} is unknown after an interrupted pipetting cycle")]
    VolumeUnknown(WellId),

    /// 调用约定被违反
    #[error("Contract violation: {0}")]
    ContractViolation(String),
}

impl LiquidError {
    /// 错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            LiquidError::NotTracked(_) => ErrorKind::NotTracked,
            LiquidError::VolumeOutOfRange { .. } | LiquidError::HeightOutOfRange { .. } => {
                ErrorKind::OutOfRange
            },
            LiquidError::InvalidLookupTable(_) | LiquidError::InvalidGeometry(_) => {
                ErrorKind::TypeMismatch
            },
            LiquidError::VolumeUnknown(_) => ErrorKind::VolumeUnknown,
            LiquidError::ContractViolation(_) => ErrorKind::ContractViolation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liquid_error_display() {
        let err = LiquidError::VolumeOutOfRange {
            volume: -3.0,
            max: 200.0,
        };
        assert_eq!(
            format!("{}", err),
            "Volume -3.000 uL is out of range [0, 200.000]"
        );
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn test_liquid_error_kind() {
        let well = WellId::new();
        assert_eq!(LiquidError::NotTracked(well).kind(), ErrorKind::NotTracked);
        assert_eq!(LiquidError::VolumeUnknown(well).kind(), ErrorKind::VolumeUnknown);
        assert_eq!(
            LiquidError::InvalidLookupTable("empty".into()).kind(),
            ErrorKind::TypeMismatch
        );
        assert_eq!(
            LiquidError::ContractViolation("both".into()).kind(),
            ErrorKind::ContractViolation
        );
    }
}
