//! 体积 ↔ 高度换算
//!
//! 三种换算方式：
//! - 长方体：`h = v / (宽 × 长)`
//! - 圆柱：`h = v / (π r²)`
//! - 查找表：对 (体积, 高度) 折线做分段线性插值
//!
//! 所有换算都要求输入落在 `[0, 最大体积]` / `[0, 深度]` 内，越界直接报错。

use crate::error::LiquidError;
use std::f64::consts::PI;

/// 浮点噪声容差（µL / mm）
///
/// 只吸收反复加减产生的舍入误差，落在容差内的值被收回到边界上。
pub const BOUNDARY_TOLERANCE: f64 = 1e-9;

fn check_range(value: f64, max: f64) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    if value < -BOUNDARY_TOLERANCE || value > max + BOUNDARY_TOLERANCE {
        return None;
    }
    Some(value.clamp(0.0, max))
}

/// 体积/高度查找表
///
/// 点按体积严格递增，高度也严格递增。第一个点不是原点时隐式补上 (0, 0)。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>"))]
pub struct LookupTable {
    points: Vec<(f64, f64)>,
}

impl LookupTable {
    /// 从 (体积 µL, 高度 mm) 点列构造
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self, LiquidError> {
        if points.is_empty() {
            return Err(LiquidError::InvalidLookupTable("table is empty".into()));
        }
        if let Some(&(v, h)) = points.iter().find(|(v, h)| !v.is_finite() || !h.is_finite()) {
            return Err(LiquidError::InvalidLookupTable(format!(
                "non-finite point ({}, {})",
                v, h
            )));
        }

        let mut table = Vec::with_capacity(points.len() + 1);
        if points[0] != (0.0, 0.0) {
            table.push((0.0, 0.0));
        }
        table.extend(points);

        for pair in table.windows(2) {
            let (v0, h0) = pair[0];
            let (v1, h1) = pair[1];
            if v1 <= v0 || h1 <= h0 {
                return Err(LiquidError::InvalidLookupTable(format!(
                    "points must be strictly increasing, got ({}, {}) after ({}, {})",
                    v1, h1, v0, h0
                )));
            }
        }

        Ok(LookupTable { points: table })
    }

    /// 包含隐式原点在内的全部点
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// 表中最大体积
    pub fn max_volume(&self) -> f64 {
        self.points.last().map(|(v, _)| *v).unwrap_or(0.0)
    }

    /// 表中最大高度
    pub fn max_height(&self) -> f64 {
        self.points.last().map(|(_, h)| *h).unwrap_or(0.0)
    }

    /// 体积 → 高度
    pub fn height_from_volume(&self, volume: f64) -> Result<f64, LiquidError> {
        let max = self.max_volume();
        let volume = check_range(volume, max)
            .ok_or(LiquidError::VolumeOutOfRange { volume, max })?;
        Ok(interpolate(&self.points, volume, |p| p.0, |p| p.1))
    }

    /// 高度 → 体积
    pub fn volume_from_height(&self, height: f64) -> Result<f64, LiquidError> {
        let depth = self.max_height();
        let height = check_range(height, depth)
            .ok_or(LiquidError::HeightOutOfRange { height, depth })?;
        Ok(interpolate(&self.points, height, |p| p.1, |p| p.0))
    }
}

impl TryFrom<Vec<(f64, f64)>> for LookupTable {
    type Error = LiquidError;

    fn try_from(points: Vec<(f64, f64)>) -> Result<Self, Self::Error> {
        LookupTable::new(points)
    }
}

impl From<LookupTable> for Vec<(f64, f64)> {
    fn from(table: LookupTable) -> Self {
        table.points
    }
}

/// 在按 `key` 递增的折线上做线性插值
///
/// 调用方保证 `x` 已落在折线范围内。
fn interpolate(
    points: &[(f64, f64)],
    x: f64,
    key: impl Fn(&(f64, f64)) -> f64,
    value: impl Fn(&(f64, f64)) -> f64,
) -> f64 {
    let idx = points.partition_point(|p| key(p) < x);
    if idx == 0 {
        return value(&points[0]);
    }
    if idx >= points.len() {
        return points.last().map(&value).unwrap_or(0.0);
    }
    let (lo, hi) = (&points[idx - 1], &points[idx]);
    let t = (x - key(lo)) / (key(hi) - key(lo));
    value(lo) + t * (value(hi) - value(lo))
}

/// 换算方式
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum CalcType {
    /// 长方体孔
    Cuboid {
        /// x 方向尺寸（mm）
        width: f64,
        /// y 方向尺寸（mm）
        length: f64,
        /// 深度（mm）
        depth: f64,
    },
    /// 圆柱孔
    Cylinder {
        /// 直径（mm）
        diameter: f64,
        /// 深度（mm）
        depth: f64,
    },
    /// 查找表（锥底孔等不规则几何）
    Lookup {
        /// 体积/高度折线
        table: LookupTable,
    },
}

impl CalcType {
    /// 构造长方体换算，尺寸必须为正
    pub fn cuboid(width: f64, length: f64, depth: f64) -> Result<Self, LiquidError> {
        check_dimensions(&[("width", width), ("length", length), ("depth", depth)])?;
        Ok(CalcType::Cuboid {
            width,
            length,
            depth,
        })
    }

    /// 构造圆柱换算，尺寸必须为正
    pub fn cylinder(diameter: f64, depth: f64) -> Result<Self, LiquidError> {
        check_dimensions(&[("diameter", diameter), ("depth", depth)])?;
        Ok(CalcType::Cylinder { diameter, depth })
    }

    /// 横截面积（mm²），查找表无固定截面
    pub fn cross_section(&self) -> Option<f64> {
        match self {
            CalcType::Cuboid { width, length, .. } => Some(width * length),
            CalcType::Cylinder { diameter, .. } => Some(PI * (diameter / 2.0).powi(2)),
            CalcType::Lookup { .. } => None,
        }
    }

    /// 深度（mm）
    pub fn depth(&self) -> f64 {
        match self {
            CalcType::Cuboid { depth, .. } | CalcType::Cylinder { depth, .. } => *depth,
            CalcType::Lookup { table } => table.max_height(),
        }
    }

    /// 最大体积（µL = mm³）
    pub fn max_volume(&self) -> f64 {
        match self {
            CalcType::Lookup { table } => table.max_volume(),
            _ => self.cross_section().unwrap_or(0.0) * self.depth(),
        }
    }

    /// 体积 → 液面高度（相对孔底）
    pub fn height_from_volume(&self, volume: f64) -> Result<f64, LiquidError> {
        match self {
            CalcType::Lookup { table } => table.height_from_volume(volume),
            _ => {
                let max = self.max_volume();
                let volume = check_range(volume, max)
                    .ok_or(LiquidError::VolumeOutOfRange { volume, max })?;
                let area = self.cross_section().unwrap_or(1.0);
                Ok(volume / area)
            },
        }
    }

    /// 液面高度 → 体积
    pub fn volume_from_height(&self, height: f64) -> Result<f64, LiquidError> {
        match self {
            CalcType::Lookup { table } => table.volume_from_height(height),
            _ => {
                let depth = self.depth();
                let height = check_range(height, depth)
                    .ok_or(LiquidError::HeightOutOfRange { height, depth })?;
                Ok(height * self.cross_section().unwrap_or(0.0))
            },
        }
    }
}

fn check_dimensions(dims: &[(&str, f64)]) -> Result<(), LiquidError> {
    for (name, value) in dims {
        if !value.is_finite() || *value <= 0.0 {
            return Err(LiquidError::InvalidGeometry(format!(
                "{} must be positive, got {}",
                name, value
            )));
        }
    }
    Ok(())
}
