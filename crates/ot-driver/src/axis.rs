//! 物理轴与轴映射
//!
//! 逻辑轴（`x`/`y`/`z`，见 [`Axis`]）是位姿图的坐标空间；
//! 物理轴（`X`/`Y`/`Z`/`A`/`B`/`C`，见 [`AxisId`]）是驱动的命令空间。
//! [`AxisMapping`] 描述一个 Mover 负责的那一组轴。

use crate::error::MoverError;
use ot_pose::Axis;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

/// 物理轴标识（大写 ASCII 字母）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AxisId(char);

impl AxisId {
    /// 龙门 X
    pub const X: AxisId = AxisId('X');
    /// 龙门 Y
    pub const Y: AxisId = AxisId('Y');
    /// 左侧 Z
    pub const Z: AxisId = AxisId('Z');
    /// 右侧 Z
    pub const A: AxisId = AxisId('A');
    /// 左侧柱塞
    pub const B: AxisId = AxisId('B');
    /// 右侧柱塞
    pub const C: AxisId = AxisId('C');

    /// 由字母创建（自动转为大写），非字母返回 `None`
    pub fn new(letter: char) -> Option<Self> {
        if letter.is_ascii_alphabetic() {
            Some(AxisId(letter.to_ascii_uppercase()))
        } else {
            None
        }
    }

    /// 轴字母
    pub fn letter(self) -> char {
        self.0
    }
}

impl fmt::Display for AxisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 物理轴 → 绝对位置（mm）
pub type AxisPositions = BTreeMap<AxisId, f64>;

/// 逻辑轴到物理轴的映射（允许子集）
#[derive(Debug, Clone, PartialEq)]
pub struct AxisMapping {
    entries: SmallVec<[(Axis, AxisId); 3]>,
}

impl AxisMapping {
    /// 创建映射
    ///
    /// 同一逻辑轴或同一物理轴出现两次时返回 `InvalidMapping`。
    pub fn new<I>(pairs: I) -> Result<Self, MoverError>
    where
        I: IntoIterator<Item = (Axis, AxisId)>,
    {
        let mut entries: SmallVec<[(Axis, AxisId); 3]> = SmallVec::new();
        for (axis, id) in pairs {
            if entries.iter().any(|(a, _)| *a == axis) {
                return Err(MoverError::InvalidMapping(format!(
                    "logical axis '{}' mapped twice",
                    axis
                )));
            }
            if entries.iter().any(|(_, p)| *p == id) {
                return Err(MoverError::InvalidMapping(format!(
                    "physical axis '{}' mapped twice",
                    id
                )));
            }
            entries.push((axis, id));
        }
        if entries.is_empty() {
            return Err(MoverError::InvalidMapping("empty axis mapping".to_string()));
        }
        entries.sort_by_key(|(axis, _)| *axis);
        Ok(AxisMapping { entries })
    }

    /// 由字母对创建，如 `[('x', 'X'), ('y', 'Y'), ('z', 'A')]`
    pub fn from_letters(pairs: &[(char, char)]) -> Result<Self, MoverError> {
        let mut parsed = Vec::with_capacity(pairs.len());
        for &(logical, physical) in pairs {
            let axis = Axis::from_letter(logical).ok_or_else(|| {
                MoverError::InvalidMapping(format!("unknown logical axis '{}'", logical))
            })?;
            let id = AxisId::new(physical).ok_or_else(|| {
                MoverError::InvalidMapping(format!("invalid physical axis '{}'", physical))
            })?;
            parsed.push((axis, id));
        }
        Self::new(parsed)
    }

    /// 逻辑轴对应的物理轴
    pub fn get(&self, axis: Axis) -> Option<AxisId> {
        self.entries
            .iter()
            .find(|(a, _)| *a == axis)
            .map(|(_, id)| *id)
    }

    /// 逻辑轴是否在映射中
    pub fn contains(&self, axis: Axis) -> bool {
        self.get(axis).is_some()
    }

    /// 映射中的全部物理轴
    pub fn physical_axes(&self) -> SmallVec<[AxisId; 3]> {
        self.entries.iter().map(|(_, id)| *id).collect()
    }

    /// 遍历 (逻辑轴, 物理轴)，按 x, y, z 顺序
    pub fn iter(&self) -> impl Iterator<Item = (Axis, AxisId)> + '_ {
        self.entries.iter().copied()
    }

    /// 映射条目数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空（构造时已保证非空）
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
