//! 移液高度计算
//!
//! 由操作前后的液面高度推导四个高度（均相对孔底，mm）：
//! 起始液面上方/下方、结束液面上方/下方。所有高度都不低于孔底间隙。

/// 某个液面的上方与下方高度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiquidSurfaceHeights {
    /// 液面 + 回提距离
    pub above: f64,
    /// 液面 - 下探距离
    pub below: f64,
}

/// 一次移液的高度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipettingHeights {
    /// 操作前液面
    pub start: LiquidSurfaceHeights,
    /// 操作后液面
    pub end: LiquidSurfaceHeights,
}

impl PipettingHeights {
    /// 计算移液高度
    ///
    /// - `start_mm` / `end_mm`: 操作前后的液面高度
    /// - `submerge` / `retract`: 液面以下 / 以上的距离
    /// - `clearance`: 孔底最小间隙
    pub fn new(start_mm: f64, end_mm: f64, submerge: f64, retract: f64, clearance: f64) -> Self {
        let surface = |h: f64| LiquidSurfaceHeights {
            above: (h + retract).max(clearance),
            below: (h - submerge).max(clearance),
        };
        PipettingHeights {
            start: surface(start_mm),
            end: surface(end_mm),
        }
    }

    /// 下探前的安全接近高度：两个液面上方高度中较高者
    ///
    /// 液面比预期浅时也不会直接扎进液体。
    pub fn approach(&self) -> f64 {
        self.start.above.max(self.end.above)
    }

    /// 吸/排液时所在高度：结束液面下方
    pub fn submerged(&self) -> f64 {
        self.end.below
    }

    /// 回提高度：结束液面上方
    pub fn retract(&self) -> f64 {
        self.end.above
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_approach_uses_higher_surface() {
        // 液面 2 mm，吸液后 0.5 mm，回提 1 mm
        let heights = PipettingHeights::new(2.0, 0.5, 0.2, 1.0, 0.0);
        assert_relative_eq!(heights.approach(), 3.0);
        assert_relative_eq!(heights.retract(), 1.5);
    }

    #[test]
    fn test_dispense_raises_approach() {
        let heights = PipettingHeights::new(5.0, 9.0, 1.0, 2.0, 1.5);
        assert_relative_eq!(heights.approach(), 11.0);
        assert_relative_eq!(heights.submerged(), 8.0);
    }

    #[test]
    fn test_heights_are_clamped_to_clearance() {
        let heights = PipettingHeights::new(1.0, 0.2, 1.5, 0.5, 1.5);
        assert_relative_eq!(heights.start.below, 1.5);
        assert_relative_eq!(heights.end.below, 1.5);
        assert_relative_eq!(heights.end.above, 1.5);
        assert_relative_eq!(heights.start.above, 1.5);
        assert!(heights.submerged() <= heights.approach());
    }
}
