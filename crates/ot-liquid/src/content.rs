//! 单孔液体状态

use crate::calc::CalcType;
use crate::error::LiquidError;
use crate::WellId;

/// 一次吸液或排液引起的体积变化（µL，非负）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum VolumeChange {
    /// 从孔中吸走
    Aspirate(f64),
    /// 向孔中排入
    Dispense(f64),
}

impl VolumeChange {
    /// 由两个可选参数构造，两者同时给出是调用约定错误
    pub fn from_options(
        aspirate: Option<f64>,
        dispense: Option<f64>,
    ) -> Result<Option<Self>, LiquidError> {
        match (aspirate, dispense) {
            (Some(_), Some(_)) => Err(LiquidError::ContractViolation(
                "aspirate and dispense cannot both be set".into(),
            )),
            (Some(v), None) => Ok(Some(VolumeChange::Aspirate(v))),
            (None, Some(v)) => Ok(Some(VolumeChange::Dispense(v))),
            (None, None) => Ok(None),
        }
    }

    /// 变化量（绝对值）
    pub fn amount(&self) -> f64 {
        match self {
            VolumeChange::Aspirate(v) | VolumeChange::Dispense(v) => *v,
        }
    }

    /// 带符号变化量：吸液为负
    pub fn signed(&self) -> f64 {
        match self {
            VolumeChange::Aspirate(v) => -v,
            VolumeChange::Dispense(v) => *v,
        }
    }

    pub fn is_aspirate(&self) -> bool {
        matches!(self, VolumeChange::Aspirate(_))
    }

    /// 按倍数缩放（储液槽多通道）
    pub fn scaled(&self, factor: f64) -> Self {
        match self {
            VolumeChange::Aspirate(v) => VolumeChange::Aspirate(v * factor),
            VolumeChange::Dispense(v) => VolumeChange::Dispense(v * factor),
        }
    }

    fn validate(&self) -> Result<(), LiquidError> {
        let amount = self.amount();
        if !amount.is_finite() || amount < 0.0 {
            return Err(LiquidError::ContractViolation(format!(
                "volume change must be a non-negative finite amount, got {}",
                amount
            )));
        }
        Ok(())
    }
}

/// 单孔液体内容
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidContent {
    well: WellId,
    calc: CalcType,
    volume: f64,
    volume_known: bool,
    name: String,
    display_name: String,
}

impl LiquidContent {
    /// 新孔：空、名称为 `Unknown`
    pub fn new(well: WellId, calc: CalcType, display_name: impl Into<String>) -> Self {
        LiquidContent {
            well,
            calc,
            volume: 0.0,
            volume_known: true,
            name: "Unknown".to_string(),
            display_name: display_name.into(),
        }
    }

    pub fn well(&self) -> WellId {
        self.well
    }

    pub fn calc_type(&self) -> &CalcType {
        &self.calc
    }

    /// 液体名称
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// 孔位显示名
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn is_volume_known(&self) -> bool {
        self.volume_known
    }

    /// 当前体积
    pub fn volume(&self) -> Result<f64, LiquidError> {
        if !self.volume_known {
            return Err(LiquidError::VolumeUnknown(self.well));
        }
        Ok(self.volume)
    }

    /// 直接设置体积，同时把记录标记为有效
    pub fn set_volume(&mut self, volume: f64) -> Result<(), LiquidError> {
        let max = self.calc.max_volume();
        // 借用高度换算做范围检查，同时吸收边界上的浮点噪声
        self.calc
            .height_from_volume(volume)
            .map_err(|_| LiquidError::VolumeOutOfRange { volume, max })?;
        self.volume = volume.clamp(0.0, max);
        self.volume_known = true;
        Ok(())
    }

    /// 由观测到的液面高度设置体积
    pub fn set_volume_from_height(&mut self, height: f64) -> Result<(), LiquidError> {
        let volume = self.calc.volume_from_height(height)?;
        self.set_volume(volume)
    }

    /// 应用 `change` 之后的体积（不修改状态）
    pub fn volume_after(&self, change: VolumeChange) -> Result<f64, LiquidError> {
        change.validate()?;
        let volume = self.volume()? + change.signed();
        let max = self.calc.max_volume();
        self.calc
            .height_from_volume(volume)
            .map_err(|_| LiquidError::VolumeOutOfRange { volume, max })?;
        Ok(volume.clamp(0.0, max))
    }

    /// 当前液面高度，或假设应用 `change` 之后的液面高度（不修改状态）
    pub fn height(&self, change: Option<VolumeChange>) -> Result<f64, LiquidError> {
        let volume = match change {
            Some(change) => self.volume_after(change)?,
            None => self.volume()?,
        };
        self.calc.height_from_volume(volume)
    }

    /// 提交体积变化
    pub fn update_volume(&mut self, change: VolumeChange) -> Result<(), LiquidError> {
        let volume = self.volume_after(change)?;
        self.commit_volume(volume);
        Ok(())
    }

    /// 写入已校验过的体积
    pub(crate) fn commit_volume(&mut self, volume: f64) {
        self.volume = volume;
    }

    /// 记录失效，直到重新设置起始体积
    pub fn mark_volume_unknown(&mut self) {
        self.volume_known = false;
    }
}
