//! # ot-liquid
//!
//! 孔级液体账本：体积与液面高度换算、吸排液前后的液面预览、
//! 以及动作完成后的体积提交。
//!
//! ## 示例
//!
//! ```rust
//! use ot_liquid::{LiquidTracker, VolumeChange, Well, WellShape};
//! use ot_pose::Point;
//!
//! let well = Well::new("A1", 40.0, WellShape::Circular { diameter: 8.0 }, Point::ZERO);
//! let mut tracker = LiquidTracker::new();
//! tracker.init_well_liquid_height(&well, None)?;
//! tracker.set_start_volume(well.id(), 1000.0)?;
//!
//! let after = tracker.get_liquid_height(well.id(), Some(VolumeChange::Aspirate(300.0)))?;
//! assert!(after < tracker.get_liquid_height(well.id(), None)?);
//! # Ok::<(), ot_liquid::LiquidError>(())
//! ```

mod calc;
mod content;
mod error;
mod labware;
mod tracker;

pub use calc::{BOUNDARY_TOLERANCE, CalcType, LookupTable};
pub use content::{LiquidContent, VolumeChange};
pub use error::LiquidError;
pub use labware::{GridSpec, Labware, LabwareKind, LabwareWell, Well, WellShape};
pub use tracker::LiquidTracker;

/// 孔标识：孔在位姿图中的对象 id
pub type WellId = ot_pose::ObjectId;
