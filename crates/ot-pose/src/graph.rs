//! 位姿图（FrameGraph）
//!
//! 维护"被跟踪对象 → 绝对位姿"的权威映射，以及描述哪些对象一起移动的父子拓扑。
//!
//! # 不变量
//!
//! - 非根节点有且只有一个父节点，在创建时一次性确定，之后不可重新挂载
//! - 子节点创建时：`pose(child) == pose(parent) + offset`
//! - 平移一个节点时，整棵子树以同一个增量一起平移
//! - 父节点在子节点之前存在，因此结构上不可能出现环
//!
//! # 所有权
//!
//! `FrameGraph` 是一个普通的可变值，由协议会话持有并以 `&mut` 显式传入调用链；
//! 不存在进程级单例，测试可以各自创建独立实例。
//!
//! # 示例
//!
//! ```rust
//! use ot_pose::{FrameGraph, ObjectId, Point};
//!
//! let mut graph = FrameGraph::new();
//! let deck = ObjectId::new();
//! let labware = ObjectId::new();
//!
//! graph.create_root_object(deck, 0.0, 0.0, 0.0)?;
//! graph.track_object(deck, labware, 10.0, 20.0, 5.0)?;
//! graph.translate_object(deck, 1.0, 1.0, 0.0)?;
//!
//! assert_eq!(graph.position(labware)?, Point::new(11.0, 21.0, 5.0));
//! # Ok::<(), ot_pose::PoseError>(())
//! ```

use crate::error::PoseError;
use crate::frame::CoordinateFrame;
use crate::id::ObjectId;
use crate::point::Point;
use std::collections::HashMap;
use tracing::{debug, trace};

/// 位姿图中的一个节点
#[derive(Debug, Clone)]
pub struct FrameNode {
    pose: CoordinateFrame,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
}

impl FrameNode {
    /// 绝对位姿（相对隐式世界原点）
    pub fn pose(&self) -> &CoordinateFrame {
        &self.pose
    }

    /// 父节点（根节点为 `None`）
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    /// 子节点，按注册顺序
    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }
}

/// 位姿图
#[derive(Debug, Clone, Default)]
pub struct FrameGraph {
    nodes: HashMap<ObjectId, FrameNode>,
    roots: Vec<ObjectId>,
}

impl FrameGraph {
    /// 创建空的位姿图
    pub fn new() -> Self {
        Self::default()
    }

    /// 被跟踪对象数量
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 对象是否被跟踪
    pub fn contains(&self, obj: ObjectId) -> bool {
        self.nodes.contains_key(&obj)
    }

    /// 所有根节点，按创建顺序
    pub fn roots(&self) -> &[ObjectId] {
        &self.roots
    }

    /// 注册一个根对象，绝对位姿为 `(x, y, z)`
    ///
    /// # 错误
    ///
    /// - `AlreadyTracked`: 对象已存在（重复创建是调用约定错误，不会被静默忽略）
    /// - `InvalidPose`: 坐标不是有限值
    pub fn create_root_object(
        &mut self,
        obj: ObjectId,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<(), PoseError> {
        let point = Point::new(x, y, z);
        self.ensure_untracked(obj)?;
        ensure_finite(obj, point)?;

        self.nodes.insert(
            obj,
            FrameNode {
                pose: CoordinateFrame::from_point(point),
                parent: None,
                children: Vec::new(),
            },
        );
        self.roots.push(obj);
        debug!(object = %obj, pose = %point, "Created root object");
        Ok(())
    }

    /// 在 `parent` 下注册子对象，绝对位姿为 `pose(parent) + (x, y, z)`
    ///
    /// # 错误
    ///
    /// - `ParentNotTracked`: 父对象不存在
    /// - `AlreadyTracked`: 子对象已存在（不支持重新挂载）
    /// - `InvalidPose`: 偏移不是有限值
    pub fn track_object(
        &mut self,
        parent: ObjectId,
        obj: ObjectId,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<(), PoseError> {
        let offset = Point::new(x, y, z);
        let parent_pose = match self.nodes.get(&parent) {
            Some(node) => node.pose,
            None => return Err(PoseError::ParentNotTracked { parent, object: obj }),
        };
        self.ensure_untracked(obj)?;
        ensure_finite(obj, offset)?;

        let pose = parent_pose.compose(&CoordinateFrame::from_point(offset));
        self.nodes.insert(
            obj,
            FrameNode {
                pose,
                parent: Some(parent),
                children: Vec::new(),
            },
        );
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(obj);
        }
        debug!(
            object = %obj,
            parent = %parent,
            pose = %pose.translation(),
            "Tracked child object"
        );
        Ok(())
    }

    /// 查询绝对位姿
    pub fn lookup(&self, obj: ObjectId) -> Result<CoordinateFrame, PoseError> {
        self.node(obj).map(|node| node.pose)
    }

    /// 查询绝对位置（平移分量）
    pub fn position(&self, obj: ObjectId) -> Result<Point, PoseError> {
        self.lookup(obj).map(|pose| pose.translation())
    }

    /// 查询节点
    pub fn node(&self, obj: ObjectId) -> Result<&FrameNode, PoseError> {
        self.nodes.get(&obj).ok_or(PoseError::NotTracked(obj))
    }

    /// 查询父节点
    pub fn parent(&self, obj: ObjectId) -> Result<Option<ObjectId>, PoseError> {
        self.node(obj).map(|node| node.parent)
    }

    /// 把 `obj` 及其整棵子树平移 `(dx, dy, dz)`
    ///
    /// 先校验并收集整棵子树，再统一写入，所以要么全部节点移动，要么都不动。
    pub fn translate_object(
        &mut self,
        obj: ObjectId,
        dx: f64,
        dy: f64,
        dz: f64,
    ) -> Result<(), PoseError> {
        let delta = Point::new(dx, dy, dz);
        ensure_finite(obj, delta)?;
        let subtree = self.get_objects_in_subtree(obj)?;

        for id in &subtree {
            if let Some(node) = self.nodes.get_mut(id) {
                node.pose.translate(delta);
                trace!(object = %id, pose = %node.pose.translation(), "Translated");
            }
        }
        debug!(
            object = %obj,
            delta = %delta,
            moved = subtree.len(),
            "Translated subtree"
        );
        Ok(())
    }

    /// 把对象移动到新的绝对位置（连同子树），返回应用的增量
    ///
    /// 运动完成后由 Mover 直接调用：`delta = new_position - pose(obj)`。
    pub fn update_position(&mut self, obj: ObjectId, new_position: Point) -> Result<Point, PoseError> {
        ensure_finite(obj, new_position)?;
        let current = self.position(obj)?;
        let delta = new_position - current;
        self.translate_object(obj, delta.x, delta.y, delta.z)?;
        Ok(delta)
    }

    /// 深度优先列出子树：先根，再按注册顺序递归子节点
    pub fn get_objects_in_subtree(&self, root: ObjectId) -> Result<Vec<ObjectId>, PoseError> {
        self.node(root)?;

        let mut result = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            result.push(id);
            // 逆序入栈，保证按注册顺序出栈
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(result)
    }

    /// 子树中的最大 Z 值（用于避障高度计算）
    pub fn max_z_in_subtree(&self, root: ObjectId) -> Result<f64, PoseError> {
        let subtree = self.get_objects_in_subtree(root)?;
        let mut max_z = f64::NEG_INFINITY;
        for id in subtree {
            max_z = max_z.max(self.node(id)?.pose.z());
        }
        Ok(max_z)
    }

    /// 相对位置：`pose(a) - pose(b)`
    pub fn relative_object_position(&self, a: ObjectId, b: ObjectId) -> Result<Point, PoseError> {
        Ok(self.position(a)? - self.position(b)?)
    }

    /// 坐标变换：把 `src` 坐标系中的点表达为 `dst` 坐标系中的点
    ///
    /// 纯计算，不修改图。
    pub fn change_base(&self, point: Point, src: ObjectId, dst: ObjectId) -> Result<Point, PoseError> {
        let src_pose = self.lookup(src)?;
        let dst_inverse = self.lookup(dst)?.inverse().ok_or(PoseError::Singular(dst))?;
        Ok(dst_inverse.compose(&src_pose).transform_point(point))
    }

    /// 清空全部状态（只在测试或会话边界使用）
    pub fn clear_all(&mut self) {
        debug!(count = self.nodes.len(), "Clearing frame graph");
        self.nodes.clear();
        self.roots.clear();
    }

    fn ensure_untracked(&self, obj: ObjectId) -> Result<(), PoseError> {
        if self.nodes.contains_key(&obj) {
            return Err(PoseError::AlreadyTracked(obj));
        }
        Ok(())
    }
}

fn ensure_finite(obj: ObjectId, point: Point) -> Result<(), PoseError> {
    if !point.is_finite() {
        return Err(PoseError::InvalidPose {
            object: obj,
            reason: format!("non-finite coordinate {}", point),
        });
    }
    Ok(())
}
