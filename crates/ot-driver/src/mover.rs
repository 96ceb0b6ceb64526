//! Mover：轴组适配器
//!
//! 把逻辑坐标（`src` 坐标系）中的运动请求转换成驱动物理轴命令（`dst` 坐标系），
//! 并在驱动调用成功返回之后更新位姿图。
//!
//! # 位姿图约定
//!
//! Mover 自身是位姿图中的一个对象（[`Mover::id`]），记录的是它在 `dst`
//! （驱动）坐标系中的位置，未映射的轴保持原值（回零后为 0）。
//! 挂在 Mover 下面的对象（安装座、移液器、吸头）随之平移。
//!
//! # 失败语义
//!
//! 所有校验都在驱动调用之前完成；驱动返回错误时位姿图保持不变。

use crate::axis::{AxisMapping, AxisPositions};
use crate::driver::{Driver, MoveOptions};
use crate::error::MoverError;
use ot_pose::{Axis, FrameGraph, ObjectId, Point};
use tracing::debug;

/// 轴组适配器
#[derive(Debug)]
pub struct Mover<D: Driver> {
    id: ObjectId,
    driver: D,
    axis_mapping: AxisMapping,
    src: ObjectId,
    dst: ObjectId,
}

impl<D: Driver> Mover<D> {
    /// 创建 Mover
    ///
    /// 调用方需要在使用前把 [`Mover::id`] 注册进位姿图，
    /// 并保证 `src`/`dst` 两个坐标系对象已被跟踪。
    pub fn new(driver: D, axis_mapping: AxisMapping, src: ObjectId, dst: ObjectId) -> Self {
        Mover {
            id: ObjectId::new(),
            driver,
            axis_mapping,
            src,
            dst,
        }
    }

    /// 位姿图中的标识
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// 轴映射
    pub fn axis_mapping(&self) -> &AxisMapping {
        &self.axis_mapping
    }

    /// 逻辑坐标系
    pub fn src(&self) -> ObjectId {
        self.src
    }

    /// 驱动坐标系
    pub fn dst(&self) -> ObjectId {
        self.dst
    }

    /// 驱动（只读）
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// 驱动（可变）
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// 取回驱动
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// 当前位置（逻辑坐标系）
    pub fn current_position(&self, graph: &FrameGraph) -> Result<Point, MoverError> {
        let physical = graph.position(self.id)?;
        Ok(graph.change_base(physical, self.dst, self.src)?)
    }

    /// 移动到逻辑坐标 `(x, y, z)`
    ///
    /// 映射中的每个轴都必须给出目标值，否则在发出任何驱动命令之前返回
    /// `MissingAxisValue`。未映射轴的值只参与坐标变换，不会被驱动。
    ///
    /// 返回写入位姿图的新位置（驱动坐标系）。
    pub fn move_to(
        &mut self,
        graph: &mut FrameGraph,
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
        options: MoveOptions,
    ) -> Result<Point, MoverError> {
        let requested = [(Axis::X, x), (Axis::Y, y), (Axis::Z, z)];
        for (axis, value) in requested {
            match value {
                None if self.axis_mapping.contains(axis) => {
                    return Err(MoverError::MissingAxisValue { axis });
                },
                Some(v) if !v.is_finite() => {
                    return Err(MoverError::InvalidTarget { axis, value: v });
                },
                _ => {},
            }
        }

        let point = Point::new(x.unwrap_or(0.0), y.unwrap_or(0.0), z.unwrap_or(0.0));
        let target = graph.change_base(point, self.src, self.dst)?;
        let current = graph.position(self.id)?;

        let mut driver_target = AxisPositions::new();
        let mut new_position = current;
        for (axis, physical) in self.axis_mapping.iter() {
            let value = target.get(axis);
            driver_target.insert(physical, value);
            new_position = new_position.with(axis, value);
        }

        debug!(mover = %self.id, axes = ?driver_target, ?options, "Moving axes");
        self.driver.move_axes(&driver_target, options)?;

        // 步进电机开环，无需回读驱动位置
        graph.update_position(self.id, new_position)?;
        Ok(new_position)
    }

    /// 沿一个逻辑轴相对移动 `distance`
    pub fn jog(&mut self, graph: &mut FrameGraph, axis: Axis, distance: f64) -> Result<Point, MoverError> {
        if !self.axis_mapping.contains(axis) {
            return Err(MoverError::UnmappedAxis { axis });
        }
        let current = self.current_position(graph)?;
        let target = current.with(axis, current.get(axis) + distance);
        let value = |a: Axis| self.axis_mapping.contains(a).then(|| target.get(a));
        let (x, y, z) = (value(Axis::X), value(Axis::Y), value(Axis::Z));
        self.move_to(graph, x, y, z, MoveOptions::default())
    }

    /// 回零映射中的全部物理轴
    ///
    /// 驱动返回的物理位置写回位姿图，未映射的逻辑轴记为 0。
    pub fn home(&mut self, graph: &mut FrameGraph) -> Result<Point, MoverError> {
        graph.position(self.id)?;
        let axes = self.axis_mapping.physical_axes();
        debug!(mover = %self.id, axes = ?axes, "Homing");
        let positions = self.driver.home(&axes)?;

        let mut homed = Point::ZERO;
        for (axis, physical) in self.axis_mapping.iter() {
            homed = homed.with(axis, positions.get(&physical).copied().unwrap_or(0.0));
        }
        graph.update_position(self.id, homed)?;
        Ok(homed)
    }

    /// 单轴探测
    pub fn probe(
        &mut self,
        graph: &mut FrameGraph,
        axis: Axis,
        movement: f64,
    ) -> Result<Point, MoverError> {
        let physical = self
            .axis_mapping
            .get(axis)
            .ok_or(MoverError::UnmappedAxis { axis })?;
        if !movement.is_finite() {
            return Err(MoverError::InvalidTarget { axis, value: movement });
        }
        let current = graph.position(self.id)?;

        debug!(mover = %self.id, %physical, movement, "Probing");
        let positions = self.driver.probe_axis(physical, movement)?;

        let mut probed = current;
        for (logical, id) in self.axis_mapping.iter() {
            if let Some(value) = positions.get(&id) {
                probed = probed.with(logical, *value);
            }
        }
        graph.update_position(self.id, probed)?;
        Ok(probed)
    }

    /// 透传给驱动的阻塞等待
    pub fn delay(&mut self, seconds: f64) -> Result<(), MoverError> {
        Ok(self.driver.delay(seconds)?)
    }
}
