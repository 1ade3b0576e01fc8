//! Simulated drivers for mock mode.
//!
//! Each driver records the commands it receives and returns deterministic
//! state, so the full robot contract runs in tests and CI without hardware.
//! [`SimMotorDriver`] and [`SimArmBus`] expose a cloneable probe onto their
//! internal state so tests can assert on what reached the "hardware".
//!
//! # Example
//!
//! ```rust
//! use remote_robot_hal::motor::MotorDriver;
//! use remote_robot_hal::sim::SimMotorDriver;
//!
//! let mut driver = SimMotorDriver::new();
//! let probe = driver.probe();
//! driver.set_motors(0.5, -0.5).unwrap();
//! assert_eq!(probe.snapshot().left, 0.5);
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use remote_robot_types::{CameraConfig, ImageFrame, RobotError};
use tracing::debug;

use crate::arm_bus::{ArmBus, SO101_JOINTS};
use crate::camera::Camera;
use crate::motor::MotorDriver;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// Motor driver
// ────────────────────────────────────────────────────────────────────────────

/// Last state written to a [`SimMotorDriver`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimMotorState {
    pub left: f64,
    pub right: f64,
    pub open: bool,
    /// Number of explicit `stop` calls.
    pub stops: u32,
}

/// Read-only view onto a [`SimMotorDriver`]'s state.
#[derive(Debug, Clone)]
pub struct SimMotorProbe(Arc<Mutex<SimMotorState>>);

impl SimMotorProbe {
    pub fn snapshot(&self) -> SimMotorState {
        lock(&self.0).clone()
    }
}

/// A simulated motor board. Always succeeds.
#[derive(Debug, Default)]
pub struct SimMotorDriver {
    state: Arc<Mutex<SimMotorState>>,
}

impl SimMotorDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> SimMotorProbe {
        SimMotorProbe(Arc::clone(&self.state))
    }
}

impl MotorDriver for SimMotorDriver {
    fn open(&mut self) -> Result<(), RobotError> {
        lock(&self.state).open = true;
        Ok(())
    }

    fn set_motors(&mut self, left: f64, right: f64) -> Result<(), RobotError> {
        let mut state = lock(&self.state);
        state.left = left;
        state.right = right;
        debug!(left, right, "sim motors set");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RobotError> {
        let mut state = lock(&self.state);
        state.left = 0.0;
        state.right = 0.0;
        state.stops += 1;
        debug!("sim motors stopped");
        Ok(())
    }

    fn close(&mut self) -> Result<(), RobotError> {
        lock(&self.state).open = false;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Servo bus
// ────────────────────────────────────────────────────────────────────────────

/// Internal state of a [`SimArmBus`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimArmState {
    pub positions: BTreeMap<String, f64>,
    pub open: bool,
    pub torque: bool,
    pub calibrated: bool,
    /// Number of goal-position writes that reached the bus.
    pub writes: u32,
}

/// Read-only view onto a [`SimArmBus`]'s state.
#[derive(Debug, Clone)]
pub struct SimArmProbe(Arc<Mutex<SimArmState>>);

impl SimArmProbe {
    pub fn snapshot(&self) -> SimArmState {
        lock(&self.0).clone()
    }
}

/// A simulated SO-101 servo bus whose joints reach their goals instantly
/// while torque is enabled. Starts calibrated with every joint at `0`.
#[derive(Debug)]
pub struct SimArmBus {
    state: Arc<Mutex<SimArmState>>,
}

impl SimArmBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimArmState {
                positions: SO101_JOINTS.iter().map(|j| (j.to_string(), 0.0)).collect(),
                open: false,
                torque: false,
                calibrated: true,
                writes: 0,
            })),
        }
    }

    /// A bus whose servos have not been calibrated yet.
    pub fn uncalibrated() -> Self {
        let bus = Self::new();
        lock(&bus.state).calibrated = false;
        bus
    }

    pub fn probe(&self) -> SimArmProbe {
        SimArmProbe(Arc::clone(&self.state))
    }

    fn require_open(state: &SimArmState) -> Result<(), RobotError> {
        if state.open {
            Ok(())
        } else {
            Err(RobotError::hardware("sim_arm_bus", "bus is not open"))
        }
    }
}

impl Default for SimArmBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ArmBus for SimArmBus {
    fn open(&mut self) -> Result<(), RobotError> {
        lock(&self.state).open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), RobotError> {
        lock(&self.state).open = false;
        Ok(())
    }

    fn read_positions(&mut self) -> Result<BTreeMap<String, f64>, RobotError> {
        let state = lock(&self.state);
        Self::require_open(&state)?;
        Ok(state.positions.clone())
    }

    fn write_goal_positions(&mut self, goals: &BTreeMap<String, f64>) -> Result<(), RobotError> {
        let mut state = lock(&self.state);
        Self::require_open(&state)?;
        for joint in goals.keys() {
            if !state.positions.contains_key(joint) {
                return Err(RobotError::hardware(joint, "no servo with this name"));
            }
        }
        state.writes += 1;
        // Servos without torque do not move.
        if state.torque {
            for (joint, goal) in goals {
                state.positions.insert(joint.clone(), *goal);
            }
        }
        Ok(())
    }

    fn set_torque(&mut self, enable: bool) -> Result<(), RobotError> {
        let mut state = lock(&self.state);
        Self::require_open(&state)?;
        state.torque = enable;
        Ok(())
    }

    fn is_calibrated(&self) -> bool {
        lock(&self.state).calibrated
    }

    fn calibrate(&mut self) -> Result<(), RobotError> {
        let mut state = lock(&self.state);
        Self::require_open(&state)?;
        state.calibrated = true;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Camera
// ────────────────────────────────────────────────────────────────────────────

/// A simulated camera returning the same synthetic RGB test pattern on every
/// capture, sized from its [`CameraConfig`].
pub struct SimCamera {
    id: String,
    height: u32,
    width: u32,
    open: bool,
}

impl SimCamera {
    pub fn new(id: impl Into<String>, config: &CameraConfig) -> Self {
        Self {
            id: id.into(),
            height: config.height,
            width: config.width,
            open: false,
        }
    }

    fn pattern(&self) -> Vec<u8> {
        let channels = CameraConfig::CHANNELS as usize;
        let mut data = Vec::with_capacity(self.height as usize * self.width as usize * channels);
        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                for c in 0..channels {
                    data.push((x * 7 + y * 13 + c * 85) as u8);
                }
            }
        }
        data
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn open(&mut self) -> Result<(), RobotError> {
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn capture(&mut self) -> Result<ImageFrame, RobotError> {
        if !self.open {
            return Err(RobotError::hardware(&self.id, "camera is not open"));
        }
        ImageFrame::new(
            self.height,
            self.width,
            CameraConfig::CHANNELS,
            self.pattern(),
        )
    }

    fn close(&mut self) -> Result<(), RobotError> {
        self.open = false;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
