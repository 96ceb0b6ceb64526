//! 坐标系（齐次变换）
//!
//! `CoordinateFrame` 内部是 4x4 齐次变换矩阵。目前只使用平移部分，
//! 旋转部分保留为单位阵。两个坐标系左乘复合后，平移等于二者之和。
//!
//! # 示例
//!
//! ```rust
//! use ot_pose::{CoordinateFrame, Point};
//!
//! let deck = CoordinateFrame::from_translation(1.0, 2.0, 0.0);
//! let offset = CoordinateFrame::from_translation(10.0, 20.0, 5.0);
//! assert_eq!(deck.compose(&offset).translation(), Point::new(11.0, 22.0, 5.0));
//! ```

use crate::point::Point;
use nalgebra::{Matrix4, Point3, Translation3};
use std::fmt;

/// 坐标系（位姿）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateFrame {
    transform: Matrix4<f64>,
}

impl Default for CoordinateFrame {
    fn default() -> Self {
        Self::identity()
    }
}

impl CoordinateFrame {
    /// 单位变换（原点）
    pub fn identity() -> Self {
        CoordinateFrame {
            transform: Matrix4::identity(),
        }
    }

    /// 由平移量创建
    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        CoordinateFrame {
            transform: Translation3::new(x, y, z).to_homogeneous(),
        }
    }

    /// 由点创建
    pub fn from_point(point: Point) -> Self {
        Self::from_translation(point.x, point.y, point.z)
    }

    /// 由任意齐次矩阵创建
    pub fn from_matrix(transform: Matrix4<f64>) -> Self {
        CoordinateFrame { transform }
    }

    /// 底层齐次矩阵
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.transform
    }

    /// 平移分量
    #[inline]
    pub fn translation(&self) -> Point {
        Point::new(
            self.transform[(0, 3)],
            self.transform[(1, 3)],
            self.transform[(2, 3)],
        )
    }

    /// X 坐标
    #[inline]
    pub fn x(&self) -> f64 {
        self.transform[(0, 3)]
    }

    /// Y 坐标
    #[inline]
    pub fn y(&self) -> f64 {
        self.transform[(1, 3)]
    }

    /// Z 坐标
    #[inline]
    pub fn z(&self) -> f64 {
        self.transform[(2, 3)]
    }

    /// 复合：`self * other`
    pub fn compose(&self, other: &CoordinateFrame) -> CoordinateFrame {
        CoordinateFrame {
            transform: self.transform * other.transform,
        }
    }

    /// 原地左乘一个平移
    pub fn translate(&mut self, delta: Point) {
        self.transform = Translation3::new(delta.x, delta.y, delta.z).to_homogeneous() * self.transform;
    }

    /// 返回平移后的新坐标系
    pub fn translated(&self, delta: Point) -> CoordinateFrame {
        let mut frame = *self;
        frame.translate(delta);
        frame
    }

    /// 逆变换（矩阵奇异时返回 `None`）
    pub fn inverse(&self) -> Option<CoordinateFrame> {
        self.transform
            .try_inverse()
            .map(|transform| CoordinateFrame { transform })
    }

    /// 把本坐标系中的点变换到父坐标系
    pub fn transform_point(&self, point: Point) -> Point {
        let p = self
            .transform
            .transform_point(&Point3::new(point.x, point.y, point.z));
        Point::new(p.x, p.y, p.z)
    }
}

impl From<Point> for CoordinateFrame {
    fn from(point: Point) -> Self {
        CoordinateFrame::from_point(point)
    }
}

impl fmt::Display for CoordinateFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame{}", self.translation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_accessors() {
        let frame = CoordinateFrame::from_translation(1.0, -2.0, 3.5);
        assert_eq!(frame.x(), 1.0);
        assert_eq!(frame.y(), -2.0);
        assert_eq!(frame.z(), 3.5);
        assert_eq!(frame.translation(), Point::new(1.0, -2.0, 3.5));
    }

    #[test]
    fn test_compose_sums_translations() {
        let a = CoordinateFrame::from_translation(1.0, 2.0, 3.0);
        let b = CoordinateFrame::from_translation(10.0, 20.0, 30.0);
        assert_eq!(a.compose(&b).translation(), Point::new(11.0, 22.0, 33.0));
        assert_eq!(b.compose(&a).translation(), Point::new(11.0, 22.0, 33.0));
    }

    #[test]
    fn test_translate_in_place() {
        let mut frame = CoordinateFrame::from_translation(1.0, 1.0, 1.0);
        frame.translate(Point::new(0.5, -1.0, 2.0));
        assert_eq!(frame.translation(), Point::new(1.5, 0.0, 3.0));
    }

    #[test]
    fn test_inverse_and_transform_point() {
        let frame = CoordinateFrame::from_translation(5.0, 0.0, -2.0);
        let inverse = frame.inverse().unwrap();
        assert_eq!(inverse.translation(), Point::new(-5.0, 0.0, 2.0));

        let p = frame.transform_point(Point::new(1.0, 1.0, 1.0));
        assert_eq!(p, Point::new(6.0, 1.0, -1.0));
        assert_eq!(inverse.transform_point(p), Point::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_identity_default() {
        assert_eq!(CoordinateFrame::default().translation(), Point::ZERO);
        assert_eq!(CoordinateFrame::default(), CoordinateFrame::identity());
    }
}
