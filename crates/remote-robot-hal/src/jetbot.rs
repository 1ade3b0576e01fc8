//! The Jetbot differential-drive robot.
//!
//! Actions and observations use normalized motor values in `[-1, 1]` under
//! the keys [`LEFT_MOTOR`] and [`RIGHT_MOTOR`], plus one image per
//! configured camera in observations.
//!
//! # Example
//!
//! ```rust
//! use remote_robot_hal::{Jetbot, Robot};
//! use remote_robot_types::{Action, JetbotConfig};
//!
//! let mut robot = Jetbot::new(JetbotConfig::mock());
//! robot.connect(true).unwrap();
//!
//! let action = Action::from([
//!     ("left_motor.value".to_string(), 0.5),
//!     ("right_motor.value".to_string(), 0.5),
//! ]);
//! robot.send_action(&action).unwrap();
//! let obs = robot.get_observation().unwrap();
//! assert_eq!(obs["left_motor.value"].as_scalar(), Some(0.5));
//!
//! robot.disconnect().unwrap();
//! ```

use remote_robot_types::{
    Action, FeatureMap, JetbotConfig, Observation, ObservationValue, RobotError,
};
use tracing::{info, warn};

use crate::camera::{Camera, CameraSet};
use crate::motor::MotorDriver;
use crate::robot::Robot;
use crate::sim::SimMotorDriver;

pub const LEFT_MOTOR: &str = "left_motor.value";
pub const RIGHT_MOTOR: &str = "right_motor.value";

/// Differential-drive robot owning its motor driver and cameras.
pub struct Jetbot {
    config: JetbotConfig,
    motors: Option<Box<dyn MotorDriver>>,
    cameras: CameraSet,
    observation_features: FeatureMap,
    action_features: FeatureMap,
    left_value: f64,
    right_value: f64,
    connected: bool,
}

impl Jetbot {
    pub const NAME: &'static str = "jetbot";

    /// Build a Jetbot from `config`.
    ///
    /// In mock mode simulated drivers are installed. Otherwise a motor driver
    /// (and one driver per configured camera) must be attached before
    /// [`Robot::connect`].
    pub fn new(config: JetbotConfig) -> Self {
        let cameras = CameraSet::from_config(&config.cameras, config.mock);
        let motors: Option<Box<dyn MotorDriver>> = if config.mock {
            Some(Box::new(SimMotorDriver::new()))
        } else {
            None
        };

        let action_features = Self::default_action_features();
        let mut observation_features = action_features.clone();
        cameras.add_features(&mut observation_features);

        Self {
            config,
            motors,
            cameras,
            observation_features,
            action_features,
            left_value: 0.0,
            right_value: 0.0,
            connected: false,
        }
    }

    /// Attach (or replace) the motor driver.
    pub fn with_motor_driver(mut self, driver: Box<dyn MotorDriver>) -> Self {
        self.motors = Some(driver);
        self
    }

    /// Attach (or replace) the driver of a configured camera.
    pub fn with_camera(mut self, camera: Box<dyn Camera>) -> Self {
        self.cameras.attach(camera);
        self
    }

    pub fn config(&self) -> &JetbotConfig {
        &self.config
    }

    /// Action (and camera-less observation) schema of every Jetbot.
    pub fn default_action_features() -> FeatureMap {
        FeatureMap::floats([LEFT_MOTOR, RIGHT_MOTOR])
    }

    fn close_after_failed_connect(motors: &mut dyn MotorDriver) {
        if let Err(e) = motors.close() {
            warn!(robot = Self::NAME, error = %e, "failed to close motor driver after failed connect");
        }
    }

    fn release_hardware(&mut self) {
        if let Some(motors) = self.motors.as_mut() {
            if self.config.disable_motors_on_disconnect
                && let Err(e) = motors.stop()
            {
                warn!(robot = Self::NAME, error = %e, "failed to stop motors");
            }
            if let Err(e) = motors.close() {
                warn!(robot = Self::NAME, error = %e, "failed to close motor driver");
            }
        }
        self.cameras.close_all();
        self.left_value = 0.0;
        self.right_value = 0.0;
    }
}

impl Robot for Jetbot {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn observation_features(&self) -> &FeatureMap {
        &self.observation_features
    }

    fn action_features(&self) -> &FeatureMap {
        &self.action_features
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_calibrated(&self) -> bool {
        // Differential drive needs no calibration.
        true
    }

    fn connect(&mut self, _calibrate: bool) -> Result<(), RobotError> {
        if self.connected {
            warn!(robot = Self::NAME, "connect called on an already connected robot; ignoring");
            return Ok(());
        }
        info!(robot = Self::NAME, mock = self.config.mock, "connecting");

        let motors = self.motors.as_mut().ok_or_else(|| {
            RobotError::Connection(format!(
                "{}: no motor driver attached (use mock mode to run without hardware)",
                Self::NAME
            ))
        })?;
        motors
            .open()
            .map_err(|e| RobotError::Connection(format!("{}: {e}", Self::NAME)))?;
        if let Err(e) = motors.set_motors(0.0, 0.0) {
            Self::close_after_failed_connect(&mut **motors);
            return Err(RobotError::Connection(format!("{}: {e}", Self::NAME)));
        }
        self.left_value = 0.0;
        self.right_value = 0.0;

        if let Err(e) = self.cameras.open_all() {
            if let Some(motors) = self.motors.as_mut() {
                Self::close_after_failed_connect(&mut **motors);
            }
            return Err(e);
        }

        self.connected = true;
        info!(robot = Self::NAME, cameras = self.cameras.len(), "connected");
        Ok(())
    }

    fn calibrate(&mut self) -> Result<(), RobotError> {
        self.ensure_connected()?;
        info!(robot = Self::NAME, "no calibration required");
        Ok(())
    }

    fn configure(&mut self) -> Result<(), RobotError> {
        self.ensure_connected()
    }

    fn get_observation(&mut self) -> Result<Observation, RobotError> {
        self.ensure_connected()?;
        let mut obs = Observation::new();
        obs.insert(LEFT_MOTOR.to_string(), ObservationValue::Scalar(self.left_value));
        obs.insert(RIGHT_MOTOR.to_string(), ObservationValue::Scalar(self.right_value));
        self.cameras.capture_into(&mut obs)?;
        Ok(obs)
    }

    fn send_action(&mut self, action: &Action) -> Result<Action, RobotError> {
        self.ensure_connected()?;
        self.action_features.validate_action(Self::NAME, action)?;

        let left = action
            .get(LEFT_MOTOR)
            .copied()
            .unwrap_or(self.left_value)
            .clamp(-1.0, 1.0);
        let right = action
            .get(RIGHT_MOTOR)
            .copied()
            .unwrap_or(self.right_value)
            .clamp(-1.0, 1.0);

        let motors = self
            .motors
            .as_mut()
            .ok_or_else(|| RobotError::NotConnected(Self::NAME.to_string()))?;
        motors.set_motors(left, right)?;
        self.left_value = left;
        self.right_value = right;

        Ok(Action::from([
            (LEFT_MOTOR.to_string(), left),
            (RIGHT_MOTOR.to_string(), right),
        ]))
    }

    fn disconnect(&mut self) -> Result<(), RobotError> {
        self.ensure_connected()?;
        info!(robot = Self::NAME, "disconnecting");
        self.release_hardware();
        self.connected = false;
        info!(robot = Self::NAME, "disconnected");
        Ok(())
    }
}
