//! 规划器配置

use crate::error::PipettingError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 孔底最小间隙（mm）
///
/// 所有计算出的高度都不低于孔底 + 该值。
pub const LABWARE_BOTTOM_CLEARANCE: f64 = 1.5;

/// 下探/回提速度（mm/s）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TipSpeeds {
    /// 下探速度
    pub submerge: f64,
    /// 回提速度
    pub retract: f64,
}

/// 规划器配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// 孔底最小间隙（mm）
    pub labware_bottom_clearance: f64,
    /// 弧线移动时高于甲板最高物体的余量（mm）
    pub travel_clearance: f64,
    /// 弧线移动的最低行进高度（mm，甲板坐标）
    pub min_travel_height: f64,
    /// 吸液时的默认下探/回提速度
    pub aspirate_speeds: TipSpeeds,
    /// 排液时的默认下探/回提速度
    pub dispense_speeds: TipSpeeds,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            labware_bottom_clearance: LABWARE_BOTTOM_CLEARANCE,
            travel_clearance: 10.0,
            min_travel_height: 0.0,
            aspirate_speeds: TipSpeeds {
                submerge: 5.0,
                retract: 5.0,
            },
            dispense_speeds: TipSpeeds {
                submerge: 5.0,
                retract: 5.0,
            },
        }
    }
}

impl PlannerConfig {
    /// 从 TOML 文本解析，缺省字段取默认值
    pub fn from_toml_str(content: &str) -> Result<Self, PipettingError> {
        let config: PlannerConfig =
            toml::from_str(content).map_err(|e| PipettingError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipettingError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| PipettingError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// 保存为 TOML 文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PipettingError> {
        let path = path.as_ref();
        let content = toml::to_string(self).map_err(|e| PipettingError::Config(e.to_string()))?;
        fs::write(path, content)
            .map_err(|e| PipettingError::Config(format!("{}: {}", path.display(), e)))
    }

    /// 校验
    pub fn validate(&self) -> Result<(), PipettingError> {
        let non_negative = [
            ("labware_bottom_clearance", self.labware_bottom_clearance),
            ("travel_clearance", self.travel_clearance),
        ];
        for (name, v) in non_negative {
            if !v.is_finite() || v < 0.0 {
                return Err(PipettingError::InvalidSetting(format!(
                    "{} must be non-negative, got {}",
                    name, v
                )));
            }
        }
        if !self.min_travel_height.is_finite() {
            return Err(PipettingError::InvalidSetting(
                "min_travel_height must be finite".into(),
            ));
        }
        let speeds = [
            ("aspirate_speeds.submerge", self.aspirate_speeds.submerge),
            ("aspirate_speeds.retract", self.aspirate_speeds.retract),
            ("dispense_speeds.submerge", self.dispense_speeds.submerge),
            ("dispense_speeds.retract", self.dispense_speeds.retract),
        ];
        for (name, v) in speeds {
            if !v.is_finite() || v <= 0.0 {
                return Err(PipettingError::InvalidSetting(format!(
                    "{} must be positive, got {}",
                    name, v
                )));
            }
        }
        Ok(())
    }

    /// 某个方向的默认速度
    pub fn speeds(&self, aspirating: bool) -> TipSpeeds {
        if aspirating {
            self.aspirate_speeds
        } else {
            self.dispense_speeds
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlannerConfig::default();
        assert_eq!(config.labware_bottom_clearance, 1.5);
        assert_eq!(config.travel_clearance, 10.0);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PlannerConfig::from_toml_str(
            r#"
travel_clearance = 20.0

[dispense_speeds]
submerge = 2.0
retract = 8.0
"#,
        )
        .unwrap();
        assert_eq!(config.travel_clearance, 20.0);
        assert_eq!(config.labware_bottom_clearance, 1.5);
        assert_eq!(config.speeds(false).retract, 8.0);
        assert_eq!(config.speeds(true).retract, 5.0);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            PlannerConfig::from_toml_str("travel_clearance = \"high\""),
            Err(PipettingError::Config(_))
        ));
        assert!(matches!(
            PlannerConfig::from_toml_str("labware_bottom_clearance = -1.0"),
            Err(PipettingError::InvalidSetting(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("planner.toml");
        let mut config = PlannerConfig::default();
        config.min_travel_height = 120.0;
        config.save_to_file(&path).unwrap();
        assert_eq!(PlannerConfig::load_from_file(&path).unwrap(), config);
    }
}
