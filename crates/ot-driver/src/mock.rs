//! 模拟驱动
//!
//! 纯内存实现的 [`Driver`]，用于测试和空跑：
//! - 记录每一条命令（按顺序）
//! - 跟踪轴位置与吸头内液体体积
//! - 模拟时钟：`delay` 只累加时间，不真正睡眠（可切换为真实时钟）
//! - 故障注入：第 N 次运动失败、排液失败、吹出失败等

use crate::axis::{AxisId, AxisPositions};
use crate::driver::{Driver, MoveOptions, RealtimeClock, seconds_to_duration};
use crate::error::DriverError;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::trace;

/// 体积比较容差（µL）
const VOLUME_EPSILON: f64 = 1e-9;

/// 已执行的驱动命令
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCommand {
    /// 多轴运动
    Move {
        /// 物理轴目标
        targets: AxisPositions,
        /// 运动选项
        options: MoveOptions,
    },
    /// 回零
    Home {
        /// 回零的轴
        axes: Vec<AxisId>,
    },
    /// 探测
    Probe {
        /// 探测轴
        axis: AxisId,
        /// 探测距离
        movement: f64,
    },
    /// 吸液
    Aspirate {
        /// 体积（µL）
        volume: f64,
        /// 流速（µL/s）
        rate: f64,
    },
    /// 排液
    Dispense {
        /// 体积（µL）
        volume: f64,
        /// 流速（µL/s）
        rate: f64,
    },
    /// 吹出
    BlowOut,
    /// 推出
    PushOut {
        /// 体积（µL）
        volume: f64,
    },
    /// 准备吸液
    PrepareForAspirate,
    /// 等待
    Delay {
        /// 秒
        seconds: f64,
    },
}

/// 故障注入配置
#[derive(Debug, Clone, Default)]
struct Faults {
    /// 第 N 次运动（从 1 开始）失败
    fail_on_move: Option<usize>,
    fail_aspirate: bool,
    fail_dispense: bool,
    fail_blow_out: bool,
}

/// 模拟驱动
#[derive(Debug, Clone)]
pub struct SimulatedDriver {
    positions: AxisPositions,
    home_positions: AxisPositions,
    probe_surfaces: BTreeMap<AxisId, f64>,
    tip_volume: f64,
    max_volume: f64,
    ready_to_aspirate: bool,
    commands: Vec<DriverCommand>,
    moves_issued: usize,
    faults: Faults,
    realtime: bool,
    simulated_time: Duration,
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDriver {
    /// 创建模拟驱动（移液器容量 1000 µL，模拟时钟）
    pub fn new() -> Self {
        SimulatedDriver {
            positions: AxisPositions::new(),
            home_positions: AxisPositions::new(),
            probe_surfaces: BTreeMap::new(),
            tip_volume: 0.0,
            max_volume: 1000.0,
            ready_to_aspirate: false,
            commands: Vec::new(),
            moves_issued: 0,
            faults: Faults::default(),
            realtime: false,
            simulated_time: Duration::ZERO,
        }
    }

    /// 设置移液器容量（µL）
    pub fn with_max_volume(mut self, max_volume: f64) -> Self {
        self.max_volume = max_volume;
        self
    }

    /// `delay` 使用真实时钟
    pub fn with_realtime_clock(mut self) -> Self {
        self.realtime = true;
        self
    }

    /// 设置某轴的回零位置
    pub fn set_home_position(&mut self, axis: AxisId, position: f64) -> &mut Self {
        self.home_positions.insert(axis, position);
        self
    }

    /// 设置某轴探测会碰到的表面位置
    pub fn set_probe_surface(&mut self, axis: AxisId, position: f64) -> &mut Self {
        self.probe_surfaces.insert(axis, position);
        self
    }

    /// 第 `n` 次运动（从 1 开始计数，包含已发出的运动）失败
    pub fn fail_on_move(&mut self, n: usize) -> &mut Self {
        self.faults.fail_on_move = Some(n);
        self
    }

    /// 下一次及之后的吸液失败
    pub fn fail_aspirate(&mut self) -> &mut Self {
        self.faults.fail_aspirate = true;
        self
    }

    /// 下一次及之后的排液失败
    pub fn fail_dispense(&mut self) -> &mut Self {
        self.faults.fail_dispense = true;
        self
    }

    /// 下一次及之后的吹出失败
    pub fn fail_blow_out(&mut self) -> &mut Self {
        self.faults.fail_blow_out = true;
        self
    }

    /// 清除全部故障注入
    pub fn clear_faults(&mut self) -> &mut Self {
        self.faults = Faults::default();
        self
    }

    /// 已执行的命令
    pub fn commands(&self) -> &[DriverCommand] {
        &self.commands
    }

    /// 取走已执行的命令
    pub fn take_commands(&mut self) -> Vec<DriverCommand> {
        std::mem::take(&mut self.commands)
    }

    /// 当前轴位置
    pub fn positions(&self) -> &AxisPositions {
        &self.positions
    }

    /// 某轴当前位置（从未移动过的轴为 0）
    pub fn position(&self, axis: AxisId) -> f64 {
        self.positions.get(&axis).copied().unwrap_or(0.0)
    }

    /// 吸头内体积（µL，包含空气间隙）
    pub fn tip_volume(&self) -> f64 {
        self.tip_volume
    }

    /// 是否已准备吸液
    pub fn ready_to_aspirate(&self) -> bool {
        self.ready_to_aspirate
    }

    /// 累计模拟时间
    pub fn simulated_time(&self) -> Duration {
        self.simulated_time
    }

    fn check_volume(volume: f64, rate: f64) -> Result<(), DriverError> {
        if !volume.is_finite() || volume < 0.0 {
            return Err(DriverError::InvalidCommand(format!("invalid volume {}", volume)));
        }
        if !rate.is_finite() || rate <= 0.0 {
            return Err(DriverError::InvalidCommand(format!("invalid flow rate {}", rate)));
        }
        Ok(())
    }
}

impl Driver for SimulatedDriver {
    fn move_axes(&mut self, targets: &AxisPositions, options: MoveOptions) -> Result<(), DriverError> {
        self.moves_issued += 1;
        if self.faults.fail_on_move == Some(self.moves_issued) {
            return Err(DriverError::Motion(format!(
                "simulated failure on move #{}",
                self.moves_issued
            )));
        }
        for (axis, value) in targets {
            if !value.is_finite() {
                return Err(DriverError::InvalidCommand(format!(
                    "non-finite target {} for axis {}",
                    value, axis
                )));
            }
        }
        trace!(?targets, "Simulated move");
        self.positions.extend(targets.iter().map(|(a, v)| (*a, *v)));
        self.commands.push(DriverCommand::Move {
            targets: targets.clone(),
            options,
        });
        Ok(())
    }

    fn home(&mut self, axes: &[AxisId]) -> Result<AxisPositions, DriverError> {
        for axis in axes {
            let home = self.home_positions.get(axis).copied().unwrap_or(0.0);
            self.positions.insert(*axis, home);
        }
        self.commands.push(DriverCommand::Home { axes: axes.to_vec() });
        Ok(self.positions.clone())
    }

    fn probe_axis(&mut self, axis: AxisId, movement: f64) -> Result<AxisPositions, DriverError> {
        let start = self.position(axis);
        let end = start + movement;
        let stop = match self.probe_surfaces.get(&axis) {
            Some(&surface)
                if (surface - start) * movement > 0.0 && (surface - start).abs() <= movement.abs() =>
            {
                surface
            },
            _ => end,
        };
        self.positions.insert(axis, stop);
        self.commands.push(DriverCommand::Probe { axis, movement });
        Ok(self.positions.clone())
    }

    fn aspirate(&mut self, volume: f64, rate: f64) -> Result<(), DriverError> {
        Self::check_volume(volume, rate)?;
        if self.faults.fail_aspirate {
            return Err(DriverError::Pipette("simulated aspirate failure".to_string()));
        }
        if !self.ready_to_aspirate {
            return Err(DriverError::Pipette("pipette is not ready to aspirate".to_string()));
        }
        if self.tip_volume + volume > self.max_volume + VOLUME_EPSILON {
            return Err(DriverError::Pipette(format!(
                "cannot aspirate {} uL: tip holds {} of {} uL",
                volume, self.tip_volume, self.max_volume
            )));
        }
        self.tip_volume += volume;
        self.commands.push(DriverCommand::Aspirate { volume, rate });
        Ok(())
    }

    fn dispense(&mut self, volume: f64, rate: f64) -> Result<(), DriverError> {
        Self::check_volume(volume, rate)?;
        if self.faults.fail_dispense {
            return Err(DriverError::Pipette("simulated dispense failure".to_string()));
        }
        if volume > self.tip_volume + VOLUME_EPSILON {
            return Err(DriverError::Pipette(format!(
                "cannot dispense {} uL: tip holds {} uL",
                volume, self.tip_volume
            )));
        }
        self.tip_volume = (self.tip_volume - volume).max(0.0);
        self.commands.push(DriverCommand::Dispense { volume, rate });
        Ok(())
    }

    fn blow_out(&mut self) -> Result<(), DriverError> {
        if self.faults.fail_blow_out {
            return Err(DriverError::Pipette("simulated blow-out failure".to_string()));
        }
        self.tip_volume = 0.0;
        self.ready_to_aspirate = false;
        self.commands.push(DriverCommand::BlowOut);
        Ok(())
    }

    fn push_out(&mut self, volume: f64) -> Result<(), DriverError> {
        if !volume.is_finite() || volume < 0.0 {
            return Err(DriverError::InvalidCommand(format!("invalid push-out {}", volume)));
        }
        self.tip_volume = 0.0;
        self.ready_to_aspirate = false;
        self.commands.push(DriverCommand::PushOut { volume });
        Ok(())
    }

    fn prepare_for_aspirate(&mut self) -> Result<(), DriverError> {
        self.ready_to_aspirate = true;
        self.commands.push(DriverCommand::PrepareForAspirate);
        Ok(())
    }

    fn delay(&mut self, seconds: f64) -> Result<(), DriverError> {
        let duration = seconds_to_duration(seconds)?;
        if self.realtime {
            RealtimeClock.sleep(seconds)?;
        }
        self.simulated_time += duration;
        self.commands.push(DriverCommand::Delay { seconds });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_records_positions() {
        let mut driver = SimulatedDriver::new();
        let mut targets = AxisPositions::new();
        targets.insert(AxisId::X, 12.0);
        driver.move_axes(&targets, MoveOptions::default()).unwrap();
        assert_eq!(driver.position(AxisId::X), 12.0);
        assert_eq!(driver.position(AxisId::Y), 0.0);
        assert_eq!(driver.commands().len(), 1);
    }

    #[test]
    fn test_fail_on_nth_move() {
        let mut driver = SimulatedDriver::new();
        driver.fail_on_move(2);
        let targets = AxisPositions::new();
        assert!(driver.move_axes(&targets, MoveOptions::default()).is_ok());
        assert!(driver.move_axes(&targets, MoveOptions::default()).is_err());
        assert!(driver.move_axes(&targets, MoveOptions::default()).is_ok());
        assert_eq!(driver.commands().len(), 2);
    }

    #[test]
    fn test_aspirate_requires_prepare() {
        let mut driver = SimulatedDriver::new().with_max_volume(50.0);
        assert!(driver.aspirate(10.0, 5.0).is_err());

        driver.prepare_for_aspirate().unwrap();
        driver.aspirate(10.0, 5.0).unwrap();
        assert_eq!(driver.tip_volume(), 10.0);
        assert!(driver.aspirate(45.0, 5.0).is_err());

        driver.dispense(4.0, 5.0).unwrap();
        assert_eq!(driver.tip_volume(), 6.0);
        assert!(driver.dispense(7.0, 5.0).is_err());

        driver.blow_out().unwrap();
        assert_eq!(driver.tip_volume(), 0.0);
        assert!(!driver.ready_to_aspirate());
    }

    #[test]
    fn test_invalid_volume_rejected() {
        let mut driver = SimulatedDriver::new();
        driver.prepare_for_aspirate().unwrap();
        assert!(matches!(
            driver.aspirate(-1.0, 5.0),
            Err(DriverError::InvalidCommand(_))
        ));
        assert!(matches!(
            driver.aspirate(1.0, 0.0),
            Err(DriverError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_probe_stops_at_surface() {
        let mut driver = SimulatedDriver::new();
        driver.set_probe_surface(AxisId::Z, 30.0);
        let mut targets = AxisPositions::new();
        targets.insert(AxisId::Z, 100.0);
        driver.move_axes(&targets, MoveOptions::default()).unwrap();

        let result = driver.probe_axis(AxisId::Z, -100.0).unwrap();
        assert_eq!(result.get(&AxisId::Z), Some(&30.0));

        // 表面不在行程内时走完全程
        let result = driver.probe_axis(AxisId::Z, 10.0).unwrap();
        assert_eq!(result.get(&AxisId::Z), Some(&40.0));
    }

    #[test]
    fn test_simulated_clock() {
        let mut driver = SimulatedDriver::new();
        driver.delay(1.0).unwrap();
        driver.delay(0.5).unwrap();
        assert_eq!(driver.simulated_time(), Duration::from_millis(1500));
        assert!(driver.delay(-1.0).is_err());
        assert!(driver.delay(1e20).is_err());
        assert_eq!(driver.simulated_time(), Duration::from_millis(1500));
        assert_eq!(driver.commands().len(), 2);
    }
}
