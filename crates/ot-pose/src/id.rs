//! 对象标识

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// 被跟踪对象的不透明标识
///
/// 以身份而非值比较：每次 [`ObjectId::new`] 都返回一个进程内唯一的新标识，
/// 即使两个对象的几何完全相同也不会相等。
///
/// 序列化为原始整数；反序列化经过 [`ObjectId::from_raw`]，
/// 恢复的标识不会与之后新分配的标识冲突。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "u64", into = "u64"))]
pub struct ObjectId(u64);

impl ObjectId {
    /// 分配新的唯一标识
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// 从原始值构造（测试与反序列化用）
    ///
    /// 分配器会推进到 `raw` 之后，[`ObjectId::new`] 不会再发出这个值。
    pub fn from_raw(raw: u64) -> Self {
        NEXT_OBJECT_ID.fetch_max(raw.saturating_add(1), Ordering::Relaxed);
        ObjectId(raw)
    }

    /// 原始值
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for ObjectId {
    fn from(raw: u64) -> Self {
        ObjectId::from_raw(raw)
    }
}

impl From<ObjectId> for u64 {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}
