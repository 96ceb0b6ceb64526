//! 液体类别参数
//!
//! 一组液体类别参数描述一次吸液或排液在物理上怎么执行：
//! 流速、下探/回提距离与速度、静置时间、空气间隙、吹出与推出。

use crate::error::PipettingError;
use serde::{Deserialize, Serialize};

/// 吸液参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspirateSettings {
    /// 流速（µL/s）
    pub flow_rate: f64,
    /// 吸液后静置（s）
    #[serde(default)]
    pub delay: f64,
}

/// 排液参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispenseSettings {
    /// 流速（µL/s）
    pub flow_rate: f64,
    /// 排液后静置（s）
    #[serde(default)]
    pub delay: f64,
    /// 排空之后柱塞继续推出的体积（µL），0 表示不推出
    #[serde(default)]
    pub push_out: f64,
}

/// 下探参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubmergeSettings {
    /// 液面以下的深度（mm）
    pub distance: f64,
    /// 下探速度（mm/s），未设置时使用规划器配置
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// 回提参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetractSettings {
    /// 液面以上的高度（mm）
    pub distance: f64,
    /// 回提速度（mm/s），未设置时使用规划器配置
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// 湿空气间隙：下探之前吸入的空气
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AirGapSettings {
    /// 体积（µL），0 表示不吸
    #[serde(default)]
    pub volume: f64,
    /// 吸入与排出空气间隙的流速（µL/s）
    pub flow_rate: f64,
}

/// 吹出参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlowOutSettings {
    /// 流速（µL/s）
    pub flow_rate: f64,
    /// 吹出体积（µL），0 表示排液后不吹出
    #[serde(default)]
    pub volume: f64,
}

/// 孔间移动参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraverseSettings {
    /// 默认移动速度（mm/s）
    pub speed: f64,
}

/// 一组完整的液体类别参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidClassSettings {
    pub aspirate: AspirateSettings,
    pub dispense: DispenseSettings,
    pub submerge: SubmergeSettings,
    pub retract: RetractSettings,
    pub wet_air_gap: AirGapSettings,
    pub blow_out: BlowOutSettings,
    pub traverse: TraverseSettings,
}

impl Default for LiquidClassSettings {
    /// 水、P1000 / T1000 的通用参数
    fn default() -> Self {
        LiquidClassSettings {
            aspirate: AspirateSettings {
                flow_rate: 150.0,
                delay: 1.0,
            },
            dispense: DispenseSettings {
                flow_rate: 600.0,
                delay: 0.5,
                push_out: 10.0,
            },
            submerge: SubmergeSettings {
                distance: 1.5,
                speed: None,
            },
            retract: RetractSettings {
                distance: 3.0,
                speed: None,
            },
            wet_air_gap: AirGapSettings {
                volume: 0.0,
                flow_rate: 150.0,
            },
            blow_out: BlowOutSettings {
                flow_rate: 80.0,
                volume: 0.0,
            },
            traverse: TraverseSettings { speed: 200.0 },
        }
    }
}

fn lerp(a: f64, b: f64, factor: f64) -> f64 {
    a + (b - a) * factor
}

fn lerp_opt(a: Option<f64>, b: Option<f64>, factor: f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(lerp(a, b, factor)),
        (a, b) => a.or(b),
    }
}

impl LiquidClassSettings {
    /// 逐字段线性插值，`factor` 为 0 时等于 `lower`，为 1 时等于 `upper`
    pub fn interpolate(lower: &Self, upper: &Self, factor: f64) -> Self {
        let f = factor.clamp(0.0, 1.0);
        LiquidClassSettings {
            aspirate: AspirateSettings {
                flow_rate: lerp(lower.aspirate.flow_rate, upper.aspirate.flow_rate, f),
                delay: lerp(lower.aspirate.delay, upper.aspirate.delay, f),
            },
            dispense: DispenseSettings {
                flow_rate: lerp(lower.dispense.flow_rate, upper.dispense.flow_rate, f),
                delay: lerp(lower.dispense.delay, upper.dispense.delay, f),
                push_out: lerp(lower.dispense.push_out, upper.dispense.push_out, f),
            },
            submerge: SubmergeSettings {
                distance: lerp(lower.submerge.distance, upper.submerge.distance, f),
                speed: lerp_opt(lower.submerge.speed, upper.submerge.speed, f),
            },
            retract: RetractSettings {
                distance: lerp(lower.retract.distance, upper.retract.distance, f),
                speed: lerp_opt(lower.retract.speed, upper.retract.speed, f),
            },
            wet_air_gap: AirGapSettings {
                volume: lerp(lower.wet_air_gap.volume, upper.wet_air_gap.volume, f),
                flow_rate: lerp(lower.wet_air_gap.flow_rate, upper.wet_air_gap.flow_rate, f),
            },
            blow_out: BlowOutSettings {
                flow_rate: lerp(lower.blow_out.flow_rate, upper.blow_out.flow_rate, f),
                volume: lerp(lower.blow_out.volume, upper.blow_out.volume, f),
            },
            traverse: TraverseSettings {
                speed: lerp(lower.traverse.speed, upper.traverse.speed, f),
            },
        }
    }

    /// 校验：所有值有限且非负，流速与速度严格为正
    pub fn validate(&self) -> Result<(), PipettingError> {
        let positive = [
            ("aspirate.flow_rate", Some(self.aspirate.flow_rate)),
            ("dispense.flow_rate", Some(self.dispense.flow_rate)),
            ("wet_air_gap.flow_rate", Some(self.wet_air_gap.flow_rate)),
            ("blow_out.flow_rate", Some(self.blow_out.flow_rate)),
            ("traverse.speed", Some(self.traverse.speed)),
            ("submerge.speed", self.submerge.speed),
            ("retract.speed", self.retract.speed),
        ];
        for (name, value) in positive {
            match value {
                Some(v) if !v.is_finite() || v <= 0.0 => {
                    return Err(PipettingError::InvalidSetting(format!(
                        "{} must be positive, got {}",
                        name, v
                    )));
                },
                _ => {},
            }
        }

        let non_negative = [
            ("aspirate.delay", self.aspirate.delay),
            ("dispense.delay", self.dispense.delay),
            ("dispense.push_out", self.dispense.push_out),
            ("submerge.distance", self.submerge.distance),
            ("retract.distance", self.retract.distance),
            ("wet_air_gap.volume", self.wet_air_gap.volume),
            ("blow_out.volume", self.blow_out.volume),
        ];
        for (name, v) in non_negative {
            if !v.is_finite() || v < 0.0 {
                return Err(PipettingError::InvalidSetting(format!(
                    "{} must be non-negative, got {}",
                    name, v
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_is_valid() {
        LiquidClassSettings::default().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_flow_rate() {
        let mut settings = LiquidClassSettings::default();
        settings.dispense.flow_rate = 0.0;
        assert!(matches!(
            settings.validate(),
            Err(PipettingError::InvalidSetting(msg)) if msg.contains("dispense.flow_rate")
        ));
    }

    #[test]
    fn test_validate_rejects_negative_distance() {
        let mut settings = LiquidClassSettings::default();
        settings.retract.distance = -1.0;
        assert!(settings.validate().is_err());

        let mut settings = LiquidClassSettings::default();
        settings.submerge.speed = Some(f64::NAN);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_interpolate_midpoint() {
        let lower = LiquidClassSettings::default();
        let mut upper = lower;
        upper.aspirate.flow_rate = 250.0;
        upper.retract.distance = 5.0;
        upper.submerge.speed = Some(10.0);

        let mid = LiquidClassSettings::interpolate(&lower, &upper, 0.5);
        assert_relative_eq!(mid.aspirate.flow_rate, 200.0);
        assert_relative_eq!(mid.retract.distance, 4.0);
        assert_relative_eq!(mid.dispense.flow_rate, 600.0);
        // 只有一侧给出速度时沿用那一侧
        assert_eq!(mid.submerge.speed, Some(10.0));
    }

    #[test]
    fn test_interpolate_endpoints() {
        let lower = LiquidClassSettings::default();
        let mut upper = lower;
        upper.blow_out.volume = 20.0;
        assert_eq!(LiquidClassSettings::interpolate(&lower, &upper, 0.0), lower);
        assert_eq!(LiquidClassSettings::interpolate(&lower, &upper, 1.0), upper);
    }
}
