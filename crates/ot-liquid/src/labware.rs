//! 耗材与孔的几何描述
//!
//! 孔的位姿约定：孔节点位于孔底中心，孔口 = 孔底 + 深度。
//! 每个孔另有一个孔口节点挂在孔节点下，避障高度计算能看到耗材的真实高度。

use crate::calc::CalcType;
use crate::error::LiquidError;
use crate::WellId;
use ot_pose::{FrameGraph, ObjectId, Point, PoseError};
use tracing::debug;

/// 孔口形状
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "shape", rename_all = "snake_case"))]
pub enum WellShape {
    /// 圆孔
    Circular {
        /// 直径（mm）
        diameter: f64,
    },
    /// 方孔
    Rectangular {
        /// x 方向尺寸（mm）
        width: f64,
        /// y 方向尺寸（mm）
        length: f64,
    },
}

/// 单个孔
#[derive(Debug, Clone, PartialEq)]
pub struct Well {
    id: WellId,
    top: ObjectId,
    name: String,
    depth: f64,
    shape: WellShape,
    offset: Point,
}

impl Well {
    /// 新建孔，`offset` 为孔底中心相对耗材原点的位置
    pub fn new(name: impl Into<String>, depth: f64, shape: WellShape, offset: Point) -> Self {
        Well {
            id: ObjectId::new(),
            top: ObjectId::new(),
            name: name.into(),
            depth,
            shape,
            offset,
        }
    }

    pub fn id(&self) -> WellId {
        self.id
    }

    /// 孔口中心节点（孔节点之上 `depth` 处）
    pub fn top_id(&self) -> ObjectId {
        self.top
    }

    /// 孔名（如 `A1`）
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn depth(&self) -> f64 {
        self.depth
    }

    pub fn shape(&self) -> WellShape {
        self.shape
    }

    /// 孔底中心相对耗材原点的位置
    pub fn offset(&self) -> Point {
        self.offset
    }

    /// 由几何推导的体积换算
    pub fn calc_type(&self) -> Result<CalcType, LiquidError> {
        match self.shape {
            WellShape::Circular { diameter } => CalcType::cylinder(diameter, self.depth),
            WellShape::Rectangular { width, length } => {
                CalcType::cuboid(width, length, self.depth)
            },
        }
    }
}

/// 耗材类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LabwareKind {
    /// 孔板
    Plate,
    /// 储液槽：一个孔被多个通道同时使用
    Reservoir,
    /// 吸头盒
    TipRack,
    /// 废液/废弃吸头
    Trash,
}

impl LabwareKind {
    /// 是否装载液体
    pub fn holds_liquid(&self) -> bool {
        matches!(self, LabwareKind::Plate | LabwareKind::Reservoir)
    }
}

/// 规则网格耗材的描述
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    /// 行数
    pub rows: usize,
    /// 列数
    pub columns: usize,
    /// 孔深（mm）
    pub depth: f64,
    /// 孔口形状
    pub shape: WellShape,
    /// A1 孔底中心相对耗材原点的位置
    pub a1_offset: Point,
    /// 列间距（+x，mm）
    pub column_spacing: f64,
    /// 行间距（A → B 方向为 -y，mm）
    pub row_spacing: f64,
}

/// 耗材
///
/// 孔按列优先排列（A1, B1, ..., H1, A2, ...），与多通道移液器的通道排列一致。
#[derive(Debug, Clone, PartialEq)]
pub struct Labware {
    id: ObjectId,
    load_name: String,
    kind: LabwareKind,
    rows: usize,
    columns: usize,
    wells: Vec<Well>,
}

impl Labware {
    /// 按规则网格生成耗材
    pub fn grid(load_name: impl Into<String>, kind: LabwareKind, spec: GridSpec) -> Self {
        let mut wells = Vec::with_capacity(spec.rows * spec.columns);
        for col in 0..spec.columns {
            for row in 0..spec.rows {
                let offset = spec.a1_offset
                    + Point::new(
                        col as f64 * spec.column_spacing,
                        -(row as f64) * spec.row_spacing,
                        0.0,
                    );
                wells.push(Well::new(well_name(row, col), spec.depth, spec.shape, offset));
            }
        }
        Labware {
            id: ObjectId::new(),
            load_name: load_name.into(),
            kind,
            rows: spec.rows,
            columns: spec.columns,
            wells,
        }
    }

    /// 由显式孔列表构造，孔数必须等于 `rows × columns`
    pub fn new(
        load_name: impl Into<String>,
        kind: LabwareKind,
        rows: usize,
        columns: usize,
        wells: Vec<Well>,
    ) -> Result<Self, LiquidError> {
        if rows == 0 || columns == 0 || wells.len() != rows * columns {
            return Err(LiquidError::InvalidGeometry(format!(
                "{} wells do not fill a {}x{} grid",
                wells.len(),
                rows,
                columns
            )));
        }
        Ok(Labware {
            id: ObjectId::new(),
            load_name: load_name.into(),
            kind,
            rows,
            columns,
            wells,
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn load_name(&self) -> &str {
        &self.load_name
    }

    pub fn kind(&self) -> LabwareKind {
        self.kind
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn wells(&self) -> &[Well] {
        &self.wells
    }

    pub fn is_reservoir(&self) -> bool {
        self.kind == LabwareKind::Reservoir
    }

    /// 按孔名查找
    pub fn well(&self, name: &str) -> Option<&Well> {
        self.wells.iter().find(|w| w.name == name)
    }

    /// 按 id 查找
    pub fn well_by_id(&self, id: WellId) -> Option<&Well> {
        self.wells.iter().find(|w| w.id == id)
    }

    /// 孔位显示名：`A1 of <load_name>`
    pub fn display_name(&self, well: &Well) -> String {
        format!("{} of {}", well.name, self.load_name)
    }

    /// 目标孔引用
    pub fn target(&self, name: &str) -> Result<LabwareWell<'_>, LiquidError> {
        let well = self.well(name).ok_or_else(|| {
            LiquidError::ContractViolation(format!("{} has no well {}", self.load_name, name))
        })?;
        Ok(LabwareWell {
            labware: self,
            well,
        })
    }

    /// 某孔所在列（行序）
    pub fn column_of(&self, id: WellId) -> Option<&[Well]> {
        let idx = self.wells.iter().position(|w| w.id == id)?;
        let col = idx / self.rows;
        Some(&self.wells[col * self.rows..(col + 1) * self.rows])
    }

    /// 以 `id` 为目标、`channels` 通道同时作用的孔
    ///
    /// - 单孔耗材或单通道：只有目标孔
    /// - 8 通道：单行耗材只有目标孔，8 行耗材为目标孔所在整列
    /// - 96 通道：全部孔
    pub fn wells_affected(&self, id: WellId, channels: usize) -> Result<Vec<WellId>, LiquidError> {
        if self.well_by_id(id).is_none() {
            return Err(LiquidError::ContractViolation(format!(
                "{} is not a well of {}",
                id, self.load_name
            )));
        }
        if self.wells.len() == 1 || channels == 1 {
            return Ok(vec![id]);
        }
        match channels {
            8 if self.rows == 1 => Ok(vec![id]),
            8 if self.rows == 8 => Ok(self
                .column_of(id)
                .map(|col| col.iter().map(Well::id).collect())
                .unwrap_or_default()),
            96 => Ok(self.wells.iter().map(Well::id).collect()),
            _ => Err(LiquidError::ContractViolation(format!(
                "{} channels cannot address {} ({} rows)",
                channels, self.load_name, self.rows
            ))),
        }
    }

    /// 把耗材挂到 `parent` 下的 `(x, y, z)`，并把每个孔及其孔口挂到耗材下
    pub fn track(
        &self,
        graph: &mut FrameGraph,
        parent: ObjectId,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<(), PoseError> {
        graph.track_object(parent, self.id, x, y, z)?;
        for well in &self.wells {
            graph.track_object(self.id, well.id, well.offset.x, well.offset.y, well.offset.z)?;
            graph.track_object(well.id, well.top, 0.0, 0.0, well.depth)?;
        }
        debug!(
            labware = %self.load_name,
            wells = self.wells.len(),
            parent = %parent,
            "Tracked labware"
        );
        Ok(())
    }
}

fn well_name(row: usize, col: usize) -> String {
    let letter = char::from(b'A' + (row % 26) as u8);
    format!("{}{}", letter, col + 1)
}

/// 指向某个耗材中某个孔的引用
#[derive(Debug, Clone, Copy)]
pub struct LabwareWell<'a> {
    /// 所属耗材
    pub labware: &'a Labware,
    /// 目标孔
    pub well: &'a Well,
}

impl LabwareWell<'_> {
    pub fn id(&self) -> WellId {
        self.well.id
    }

    /// 孔位显示名
    pub fn display_name(&self) -> String {
        self.labware.display_name(self.well)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn plate_spec() -> GridSpec {
        GridSpec {
            rows: 8,
            columns: 12,
            depth: 10.9,
            shape: WellShape::Circular { diameter: 6.86 },
            a1_offset: Point::new(14.38, 74.24, 1.0),
            column_spacing: 9.0,
            row_spacing: 9.0,
        }
    }

    #[test]
    fn test_grid_naming_is_column_major() {
        let plate = Labware::grid("plate_96", LabwareKind::Plate, plate_spec());
        assert_eq!(plate.wells().len(), 96);
        assert_eq!(plate.wells()[0].name(), "A1");
        assert_eq!(plate.wells()[1].name(), "B1");
        assert_eq!(plate.wells()[8].name(), "A2");
        assert_eq!(plate.wells()[95].name(), "H12");
    }

    #[test]
    fn test_grid_offsets() {
        let plate = Labware::grid("plate_96", LabwareKind::Plate, plate_spec());
        let b2 = plate.well("B2").unwrap();
        assert_relative_eq!(b2.offset().x, 23.38, epsilon = 1e-9);
        assert_relative_eq!(b2.offset().y, 65.24, epsilon = 1e-9);
        assert_relative_eq!(b2.offset().z, 1.0);
    }

    #[test]
    fn test_wells_affected_single_channel() {
        let plate = Labware::grid("plate_96", LabwareKind::Plate, plate_spec());
        let c3 = plate.well("C3").unwrap().id();
        assert_eq!(plate.wells_affected(c3, 1).unwrap(), vec![c3]);
    }

    #[test]
    fn test_wells_affected_eight_channel_column() {
        let plate = Labware::grid("plate_96", LabwareKind::Plate, plate_spec());
        let a3 = plate.well("A3").unwrap().id();
        let affected = plate.wells_affected(a3, 8).unwrap();
        assert_eq!(affected.len(), 8);
        let names: Vec<_> = affected
            .iter()
            .map(|id| plate.well_by_id(*id).unwrap().name().to_string())
            .collect();
        assert_eq!(names, ["A3", "B3", "C3", "D3", "E3", "F3", "G3", "H3"]);
    }

    #[test]
    fn test_wells_affected_reservoir() {
        let reservoir = Labware::grid(
            "reservoir_12",
            LabwareKind::Reservoir,
            GridSpec {
                rows: 1,
                columns: 12,
                depth: 40.0,
                shape: WellShape::Rectangular {
                    width: 8.0,
                    length: 70.0,
                },
                a1_offset: Point::new(13.9, 42.7, 2.0),
                column_spacing: 9.0,
                row_spacing: 0.0,
            },
        );
        let a1 = reservoir.well("A1").unwrap().id();
        assert_eq!(reservoir.wells_affected(a1, 8).unwrap(), vec![a1]);
        assert_eq!(reservoir.wells_affected(a1, 96).unwrap().len(), 12);
    }

    #[test]
    fn test_wells_affected_rejects_bad_channels() {
        let plate = Labware::grid("plate_96", LabwareKind::Plate, plate_spec());
        let a1 = plate.well("A1").unwrap().id();
        assert!(matches!(
            plate.wells_affected(a1, 4),
            Err(LiquidError::ContractViolation(_))
        ));
        assert!(plate.wells_affected(ObjectId::new(), 1).is_err());
    }

    #[test]
    fn test_new_rejects_incomplete_grid() {
        let well = Well::new("A1", 10.0, WellShape::Circular { diameter: 5.0 }, Point::ZERO);
        assert!(Labware::new("odd", LabwareKind::Plate, 2, 1, vec![well]).is_err());
    }

    #[test]
    fn test_track_registers_wells() {
        let plate = Labware::grid("plate_96", LabwareKind::Plate, plate_spec());
        let deck = ObjectId::new();
        let mut graph = FrameGraph::new();
        graph.create_root_object(deck, 0.0, 0.0, 0.0).unwrap();
        plate.track(&mut graph, deck, 100.0, 0.0, 0.0).unwrap();
        assert_eq!(graph.len(), 1 + 1 + 96 * 2);

        let a1 = plate.well("A1").unwrap();
        let pos = graph.relative_object_position(a1.id(), deck).unwrap();
        assert_relative_eq!(pos.x, 114.38, epsilon = 1e-9);
        assert_relative_eq!(pos.z, 1.0, epsilon = 1e-9);

        // 孔口随孔一起登记，甲板最高点是孔口而不是孔底
        let top = graph.relative_object_position(a1.top_id(), deck).unwrap();
        assert_relative_eq!(top.x, pos.x, epsilon = 1e-9);
        assert_relative_eq!(top.z, 1.0 + a1.depth(), epsilon = 1e-9);
        assert_relative_eq!(graph.max_z_in_subtree(deck).unwrap(), 1.0 + a1.depth(), epsilon = 1e-9);
    }

    #[test]
    fn test_target_display_name() {
        let plate = Labware::grid("plate_96", LabwareKind::Plate, plate_spec());
        let target = plate.target("D4").unwrap();
        assert_eq!(target.display_name(), "D4 of plate_96");
        assert!(plate.target("Z99").is_err());
    }
}
