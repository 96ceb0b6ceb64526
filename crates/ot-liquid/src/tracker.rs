//! 液体账本
//!
//! 以孔为键维护体积记录。只有 `update_well_volume` / `update_affected_wells`
//! 会修改体积，且必须在真实动作完成之后调用。

use crate::calc::{CalcType, LookupTable};
use crate::content::{LiquidContent, VolumeChange};
use crate::error::LiquidError;
use crate::labware::{Labware, LabwareWell, Well};
use crate::WellId;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// 液体账本
///
/// 孔按注册顺序保存（`ObjectId` 单调递增），使设置说明的输出顺序稳定。
#[derive(Debug, Clone, Default)]
pub struct LiquidTracker {
    items: BTreeMap<WellId, LiquidContent>,
}

impl LiquidTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已注册孔数
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, well: WellId) -> bool {
        self.items.contains_key(&well)
    }

    /// 清空所有孔
    pub fn reset(&mut self) {
        debug!(count = self.items.len(), "Resetting liquid tracker");
        self.items.clear();
    }

    /// 注册孔并选择体积换算方式
    ///
    /// 给出查找表时使用查找表，否则按孔口形状选择圆柱或长方体。
    /// 已注册的孔会被重置为空。
    pub fn init_well_liquid_height(
        &mut self,
        well: &Well,
        lookup_table: Option<LookupTable>,
    ) -> Result<(), LiquidError> {
        self.init_well_with_display_name(well, well.name().to_string(), lookup_table)
    }

    fn init_well_with_display_name(
        &mut self,
        well: &Well,
        display_name: String,
        lookup_table: Option<LookupTable>,
    ) -> Result<(), LiquidError> {
        let calc = match lookup_table {
            Some(table) => CalcType::Lookup { table },
            None => well.calc_type()?,
        };
        debug!(well = %well.id(), name = well.name(), ?calc, "Initialised well");
        self.items
            .insert(well.id(), LiquidContent::new(well.id(), calc, display_name));
        Ok(())
    }

    /// 注册耗材的全部孔，吸头盒与废料槽跳过，返回注册的孔数
    pub fn init_labware(&mut self, labware: &Labware) -> Result<usize, LiquidError> {
        if !labware.kind().holds_liquid() {
            debug!(labware = labware.load_name(), "Skipping labware without liquid");
            return Ok(0);
        }
        for well in labware.wells() {
            self.init_well_with_display_name(well, labware.display_name(well), None)?;
        }
        Ok(labware.wells().len())
    }

    /// 孔的液体记录
    pub fn content(&self, well: WellId) -> Result<&LiquidContent, LiquidError> {
        self.items.get(&well).ok_or(LiquidError::NotTracked(well))
    }

    fn content_mut(&mut self, well: WellId) -> Result<&mut LiquidContent, LiquidError> {
        self.items.get_mut(&well).ok_or(LiquidError::NotTracked(well))
    }

    /// 设置起始体积
    pub fn set_start_volume(&mut self, well: WellId, volume: f64) -> Result<(), LiquidError> {
        self.content_mut(well)?.set_volume(volume)?;
        debug!(well = %well, volume, "Set start volume");
        Ok(())
    }

    /// 由观测到的液面高度设置起始体积，可同时指定液体名称
    pub fn set_start_volume_from_liquid_height(
        &mut self,
        well: WellId,
        height: f64,
        name: Option<&str>,
    ) -> Result<(), LiquidError> {
        let content = self.content_mut(well)?;
        content.set_volume_from_height(height)?;
        if let Some(name) = name {
            content.set_name(name);
        }
        debug!(well = %well, height, "Set start volume from liquid height");
        Ok(())
    }

    /// 设置液体名称
    pub fn set_liquid_name(&mut self, well: WellId, name: &str) -> Result<(), LiquidError> {
        self.content_mut(well)?.set_name(name);
        Ok(())
    }

    /// 当前体积
    pub fn get_volume(&self, well: WellId) -> Result<f64, LiquidError> {
        self.content(well)?.volume()
    }

    pub fn is_volume_known(&self, well: WellId) -> Result<bool, LiquidError> {
        Ok(self.content(well)?.is_volume_known())
    }

    /// 液面高度（相对孔底），可预览假设的体积变化
    ///
    /// 纯查询，不修改记录。
    pub fn get_liquid_height(
        &self,
        well: WellId,
        change: Option<VolumeChange>,
    ) -> Result<f64, LiquidError> {
        self.content(well)?.height(change)
    }

    /// 液面高度变化：`after - before`
    pub fn get_height_change(&self, well: WellId, change: VolumeChange) -> Result<f64, LiquidError> {
        let content = self.content(well)?;
        Ok(content.height(Some(change))? - content.height(None)?)
    }

    /// 提交单孔体积变化
    pub fn update_well_volume(&mut self, well: WellId, change: VolumeChange) -> Result<(), LiquidError> {
        let content = self.content_mut(well)?;
        content.update_volume(change)?;
        debug!(well = %well, ?change, volume = ?content.volume().ok(), "Updated well volume");
        Ok(())
    }

    /// 多通道在 `target` 上实际作用于每个孔的体积变化
    ///
    /// 储液槽中多个通道共用一个孔，单孔变化量 = 单通道体积 × 落在该孔内的通道数。
    fn actual_change(
        target: LabwareWell<'_>,
        affected: usize,
        channels: usize,
        change: VolumeChange,
    ) -> VolumeChange {
        if target.labware.is_reservoir() {
            let per_well = (channels / affected.max(1)).max(1);
            change.scaled(per_well as f64)
        } else {
            change
        }
    }

    /// 一次多通道操作前后目标孔的液面高度
    pub fn get_before_and_after_heights(
        &self,
        target: LabwareWell<'_>,
        channels: usize,
        change: VolumeChange,
    ) -> Result<(f64, f64), LiquidError> {
        let affected = target.labware.wells_affected(target.id(), channels)?;
        let actual = Self::actual_change(target, affected.len(), channels, change);
        let before = self.get_liquid_height(target.id(), None)?;
        let after = self.get_liquid_height(target.id(), Some(actual))?;
        Ok((before, after))
    }

    /// 校验多通道同时作用的所有孔都能承受该体积变化，不修改账本
    ///
    /// 返回每个受影响孔及其变化后的体积。
    pub fn check_affected_wells(
        &self,
        target: LabwareWell<'_>,
        channels: usize,
        change: VolumeChange,
    ) -> Result<Vec<(WellId, f64)>, LiquidError> {
        let affected = target.labware.wells_affected(target.id(), channels)?;
        let actual = Self::actual_change(target, affected.len(), channels, change);
        affected
            .into_iter()
            .map(|well| Ok((well, self.content(well)?.volume_after(actual)?)))
            .collect()
    }

    /// 对多通道同时作用的所有孔提交体积变化
    ///
    /// 先校验全部孔，全部通过后再统一提交，任何一个孔越界都不会留下部分更新。
    pub fn update_affected_wells(
        &mut self,
        target: LabwareWell<'_>,
        channels: usize,
        change: VolumeChange,
    ) -> Result<Vec<WellId>, LiquidError> {
        let checked = self.check_affected_wells(target, channels, change)?;
        let mut affected = Vec::with_capacity(checked.len());
        for (well, volume) in checked {
            self.content_mut(well)?.commit_volume(volume);
            affected.push(well);
        }

        info!(
            well = %target.display_name(),
            wells = affected.len(),
            ?change,
            "Committed volume change"
        );
        Ok(affected)
    }

    /// 标记单孔体积未知
    pub fn mark_volume_unknown(&mut self, well: WellId) -> Result<(), LiquidError> {
        let content = self.content_mut(well)?;
        content.mark_volume_unknown();
        warn!(well = %content.display_name(), "Well volume is now unknown");
        Ok(())
    }

    /// 标记多通道同时作用的所有孔体积未知
    pub fn mark_affected_unknown(
        &mut self,
        target: LabwareWell<'_>,
        channels: usize,
    ) -> Result<Vec<WellId>, LiquidError> {
        let affected = target.labware.wells_affected(target.id(), channels)?;
        for well in &affected {
            if self.contains(*well) {
                self.mark_volume_unknown(*well)?;
            }
        }
        Ok(affected)
    }

    /// 设置说明：列出需要预先加液的孔
    ///
    /// 没有任何孔有液体时返回空字符串。
    pub fn setup_instructions(&self) -> String {
        let found: Vec<&LiquidContent> = self
            .items
            .values()
            .filter(|c| c.volume().map(|v| v > 0.0).unwrap_or(false))
            .collect();
        if found.is_empty() {
            return String::new();
        }
        let mut lines = vec!["Add the following volumes (uL) to the specified wells:".to_string()];
        for content in found {
            lines.push(format!(
                "\t{} -> {} uL -> {}",
                content.name(),
                content.volume().map(|v| v.round() as i64).unwrap_or(0),
                content.display_name()
            ));
        }
        lines.join("\n")
    }
}
