//! 液体类别表
//!
//! 按 (移液器量程, 吸头量程) 分组，每组是一串按目标体积排序的参数点。
//! 查询体积落在两点之间时逐字段线性插值，超出两端时取端点。

use crate::error::PipettingError;
use crate::settings::{
    AirGapSettings, AspirateSettings, BlowOutSettings, DispenseSettings, LiquidClassSettings,
    RetractSettings, SubmergeSettings, TraverseSettings,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// 某一目标体积下的参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumePoint {
    /// 目标体积（µL）
    pub volume: f64,
    pub settings: LiquidClassSettings,
}

/// 一种移液器与吸头组合的全部参数点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipLiquidClass {
    /// 移液器量程（µL）
    pub pipette: u32,
    /// 吸头量程（µL）
    pub tip: u32,
    pub points: Vec<VolumePoint>,
}

/// 液体类别表
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LiquidClassTable {
    #[serde(rename = "liquid_class", default)]
    classes: Vec<TipLiquidClass>,
}

impl LiquidClassTable {
    /// 构造并校验
    ///
    /// 拒绝：重复的 (移液器, 吸头) 组合、同组内重复的体积点、空组、不合法的参数。
    pub fn new(classes: Vec<TipLiquidClass>) -> Result<Self, PipettingError> {
        let mut table = LiquidClassTable { classes };
        table.normalize()?;
        Ok(table)
    }

    fn normalize(&mut self) -> Result<(), PipettingError> {
        for (i, class) in self.classes.iter().enumerate() {
            if self.classes[..i]
                .iter()
                .any(|c| c.pipette == class.pipette && c.tip == class.tip)
            {
                return Err(PipettingError::InvalidSetting(format!(
                    "duplicate liquid class for P{} with T{}",
                    class.pipette, class.tip
                )));
            }
        }

        for class in &mut self.classes {
            if class.points.is_empty() {
                return Err(PipettingError::InvalidSetting(format!(
                    "liquid class for P{} with T{} has no volume points",
                    class.pipette, class.tip
                )));
            }
            for point in &class.points {
                if !point.volume.is_finite() || point.volume <= 0.0 {
                    return Err(PipettingError::InvalidSetting(format!(
                        "volume point {} must be positive",
                        point.volume
                    )));
                }
                point.settings.validate()?;
            }
            class.points.sort_by(|a, b| a.volume.total_cmp(&b.volume));
            if let Some(pair) = class.points.windows(2).find(|p| p[0].volume == p[1].volume) {
                return Err(PipettingError::InvalidSetting(format!(
                    "duplicate volume point {} uL for P{} with T{}",
                    pair[0].volume, class.pipette, class.tip
                )));
            }
        }
        Ok(())
    }

    /// 全部分组
    pub fn classes(&self) -> &[TipLiquidClass] {
        &self.classes
    }

    /// 某个组合的参数点
    pub fn class(&self, pipette: u32, tip: u32) -> Option<&TipLiquidClass> {
        self.classes
            .iter()
            .find(|c| c.pipette == pipette && c.tip == tip)
    }

    /// 解析目标体积对应的参数
    ///
    /// - 正好命中某个点：返回该点
    /// - 小于最小点 / 大于最大点：返回端点
    /// - 两点之间：逐字段线性插值
    pub fn resolve(
        &self,
        pipette: u32,
        tip: u32,
        volume: f64,
    ) -> Result<LiquidClassSettings, PipettingError> {
        if !volume.is_finite() || volume < 0.0 {
            return Err(PipettingError::ContractViolation(format!(
                "cannot resolve a liquid class for {} uL",
                volume
            )));
        }
        let class = self
            .class(pipette, tip)
            .ok_or(PipettingError::ConfigurationMissing { pipette, tip })?;
        let points = &class.points;

        let upper_idx = points.partition_point(|p| p.volume < volume);
        let settings = if upper_idx == 0 {
            points[0].settings
        } else if upper_idx >= points.len() {
            points[points.len() - 1].settings
        } else if points[upper_idx].volume == volume {
            points[upper_idx].settings
        } else {
            let (lower, upper) = (&points[upper_idx - 1], &points[upper_idx]);
            let factor = (volume - lower.volume) / (upper.volume - lower.volume);
            LiquidClassSettings::interpolate(&lower.settings, &upper.settings, factor)
        };
        debug!(pipette, tip, volume, "Resolved liquid class");
        Ok(settings)
    }

    /// 从 TOML 文本解析
    pub fn from_toml_str(content: &str) -> Result<Self, PipettingError> {
        let mut table: LiquidClassTable =
            toml::from_str(content).map_err(|e| PipettingError::Config(e.to_string()))?;
        table.normalize()?;
        Ok(table)
    }

    /// 从 TOML 文件加载
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipettingError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| PipettingError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// 序列化为 TOML 文本
    pub fn to_toml_string(&self) -> Result<String, PipettingError> {
        toml::to_string(self).map_err(|e| PipettingError::Config(e.to_string()))
    }

    /// 内置的水参数表
    ///
    /// P50 配 T50，P1000 配 T50 / T200 / T1000。
    pub fn builtin() -> Self {
        LiquidClassTable {
            classes: vec![
                water_class(
                    50,
                    50,
                    &[
                        (1.0, 35.0, 0.1, 57.0, 7.0),
                        (10.0, 23.5, 0.1, 57.0, 2.0),
                        (50.0, 35.0, 0.1, 57.0, 2.0),
                    ],
                ),
                water_class(
                    1000,
                    50,
                    &[
                        (5.0, 318.0, 0.1, 318.0, 5.0),
                        (10.0, 478.0, 0.1, 478.0, 5.0),
                        (50.0, 478.0, 0.1, 57.0, 5.0),
                    ],
                ),
                water_class(
                    1000,
                    200,
                    &[
                        (5.0, 716.0, 5.0, 716.0, 5.0),
                        (50.0, 716.0, 3.5, 716.0, 5.0),
                        (200.0, 716.0, 2.0, 716.0, 5.0),
                    ],
                ),
                water_class(
                    1000,
                    1000,
                    &[
                        (10.0, 160.0, 10.0, 160.0, 20.0),
                        (100.0, 716.0, 10.0, 716.0, 20.0),
                        (1000.0, 716.0, 10.0, 716.0, 20.0),
                    ],
                ),
            ],
        }
    }
}

/// (体积, 吸液流速, 空气间隙, 排液流速, 推出体积)
type WaterPoint = (f64, f64, f64, f64, f64);

fn water_class(pipette: u32, tip: u32, points: &[WaterPoint]) -> TipLiquidClass {
    TipLiquidClass {
        pipette,
        tip,
        points: points
            .iter()
            .map(|&(volume, aspirate, air_gap, dispense, push_out)| VolumePoint {
                volume,
                settings: water(aspirate, air_gap, dispense, push_out),
            })
            .collect(),
    }
}

fn water(aspirate: f64, air_gap: f64, dispense: f64, push_out: f64) -> LiquidClassSettings {
    LiquidClassSettings {
        aspirate: AspirateSettings {
            flow_rate: aspirate,
            delay: 1.0,
        },
        dispense: DispenseSettings {
            flow_rate: dispense,
            delay: 0.5,
            push_out,
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
            volume: air_gap,
            flow_rate: aspirate,
        },
        blow_out: BlowOutSettings {
            flow_rate: 80.0,
            volume: 0.0,
        },
        traverse: TraverseSettings { speed: 200.0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_builtin_is_valid() {
        let table = LiquidClassTable::builtin();
        assert_eq!(table.classes().len(), 4);
        LiquidClassTable::new(table.classes().to_vec()).unwrap();
    }

    #[test]
    fn test_resolve_exact_point() {
        let table = LiquidClassTable::builtin();
        let settings = table.resolve(50, 50, 10.0).unwrap();
        assert_relative_eq!(settings.aspirate.flow_rate, 23.5);
        assert_relative_eq!(settings.dispense.push_out, 2.0);
    }

    #[test]
    fn test_resolve_clamps_to_endpoints() {
        let table = LiquidClassTable::builtin();
        let low = table.resolve(1000, 1000, 1.0).unwrap();
        assert_relative_eq!(low.aspirate.flow_rate, 160.0);
        let high = table.resolve(1000, 1000, 5000.0).unwrap();
        assert_relative_eq!(high.aspirate.flow_rate, 716.0);
    }

    #[test]
    fn test_resolve_interpolates() {
        let table = LiquidClassTable::builtin();
        let settings = table.resolve(1000, 200, 27.5).unwrap();
        // 5 -> 50 uL 之间的中点
        assert_relative_eq!(settings.wet_air_gap.volume, 4.25, epsilon = 1e-12);
        assert_relative_eq!(settings.aspirate.flow_rate, 716.0);
    }

    #[test]
    fn test_resolve_missing_configuration() {
        let table = LiquidClassTable::builtin();
        assert_eq!(
            table.resolve(50, 1000, 10.0),
            Err(PipettingError::ConfigurationMissing {
                pipette: 50,
                tip: 1000
            })
        );
        assert!(matches!(
            table.resolve(50, 50, f64::NAN),
            Err(PipettingError::ContractViolation(_))
        ));
    }

    #[test]
    fn test_duplicate_volume_points_rejected() {
        let point = VolumePoint {
            volume: 10.0,
            settings: LiquidClassSettings::default(),
        };
        let result = LiquidClassTable::new(vec![TipLiquidClass {
            pipette: 50,
            tip: 50,
            points: vec![point, point],
        }]);
        assert!(matches!(result, Err(PipettingError::InvalidSetting(_))));
    }

    #[test]
    fn test_duplicate_class_rejected() {
        let class = TipLiquidClass {
            pipette: 50,
            tip: 50,
            points: vec![VolumePoint {
                volume: 10.0,
                settings: LiquidClassSettings::default(),
            }],
        };
        assert!(LiquidClassTable::new(vec![class.clone(), class]).is_err());
    }

    #[test]
    fn test_points_are_sorted() {
        let settings = LiquidClassSettings::default();
        let table = LiquidClassTable::new(vec![TipLiquidClass {
            pipette: 1000,
            tip: 1000,
            points: vec![
                VolumePoint {
                    volume: 100.0,
                    settings,
                },
                VolumePoint {
                    volume: 10.0,
                    settings,
                },
            ],
        }])
        .unwrap();
        let volumes: Vec<f64> = table.classes()[0].points.iter().map(|p| p.volume).collect();
        assert_eq!(volumes, vec![10.0, 100.0]);
    }

    #[test]
    fn test_toml_round_trip() {
        let table = LiquidClassTable::builtin();
        let text = table.to_toml_string().unwrap();
        assert!(text.contains("[[liquid_class]]"));
        let parsed = LiquidClassTable::from_toml_str(&text).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn test_from_toml_str() {
        let text = r#"
[[liquid_class]]
pipette = 50
tip = 50

[[liquid_class.points]]
volume = 20.0

[liquid_class.points.settings]
aspirate = { flow_rate = 30.0, delay = 1.0 }
dispense = { flow_rate = 50.0, push_out = 2.0 }
submerge = { distance = 1.5, speed = 5.0 }
retract = { distance = 3.0 }
wet_air_gap = { flow_rate = 30.0 }
blow_out = { flow_rate = 40.0 }
traverse = { speed = 150.0 }
"#;
        let table = LiquidClassTable::from_toml_str(text).unwrap();
        let settings = table.resolve(50, 50, 20.0).unwrap();
        assert_relative_eq!(settings.dispense.delay, 0.0);
        assert_eq!(settings.submerge.speed, Some(5.0));
        assert_eq!(settings.retract.speed, None);
    }

    #[test]
    fn test_from_toml_str_rejects_invalid() {
        assert!(matches!(
            LiquidClassTable::from_toml_str("liquid_class = 5"),
            Err(PipettingError::Config(_))
        ));
        let text = r#"
[[liquid_class]]
pipette = 50
tip = 50
points = []
"#;
        assert!(matches!(
            LiquidClassTable::from_toml_str(text),
            Err(PipettingError::InvalidSetting(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("liquid_classes.toml");
        fs::write(&path, LiquidClassTable::builtin().to_toml_string().unwrap()).unwrap();
        let table = LiquidClassTable::load_from_file(&path).unwrap();
        assert!(table.class(1000, 200).is_some());

        assert!(matches!(
            LiquidClassTable::load_from_file(dir.path().join("missing.toml")),
            Err(PipettingError::Config(_))
        ));
    }
}
