//! The SO-101 follower arm driven through a local [`ArmBus`].
//!
//! Features are `<joint>.pos` for the six joints of [`SO101_JOINTS`], in
//! normalized units, plus one image per configured camera in observations.

use std::collections::BTreeMap;

use remote_robot_types::{
    Action, FeatureMap, Observation, ObservationValue, RobotError, So101Config,
};
use tracing::{info, warn};

use crate::arm_bus::{ArmBus, SO101_JOINTS, joint_range};
use crate::camera::{Camera, CameraSet};
use crate::robot::Robot;
use crate::sim::SimArmBus;

const POS_SUFFIX: &str = ".pos";

/// SO-101 arm owning its servo bus and cameras.
pub struct So101Follower {
    config: So101Config,
    bus: Option<Box<dyn ArmBus>>,
    cameras: CameraSet,
    observation_features: FeatureMap,
    action_features: FeatureMap,
    connected: bool,
}

impl So101Follower {
    pub const NAME: &'static str = "so101_follower";

    /// Build an arm from `config`.
    ///
    /// In mock mode a [`SimArmBus`] and simulated cameras are installed;
    /// otherwise attach a bus with [`So101Follower::with_bus`].
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Config`] when `max_relative_target` is not a
    /// positive number.
    pub fn new(config: So101Config) -> Result<Self, RobotError> {
        if let Some(max) = config.max_relative_target
            && !(max.is_finite() && max > 0.0)
        {
            return Err(RobotError::Config(format!(
                "max_relative_target must be positive, got {max}"
            )));
        }

        let cameras = CameraSet::from_config(&config.cameras, config.mock);
        let bus: Option<Box<dyn ArmBus>> = if config.mock {
            Some(Box::new(SimArmBus::new()))
        } else {
            None
        };

        let action_features = Self::default_action_features();
        let mut observation_features = action_features.clone();
        cameras.add_features(&mut observation_features);

        Ok(Self {
            config,
            bus,
            cameras,
            observation_features,
            action_features,
            connected: false,
        })
    }

    /// Attach (or replace) the servo bus.
    pub fn with_bus(mut self, bus: Box<dyn ArmBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Attach (or replace) the driver of a configured camera.
    pub fn with_camera(mut self, camera: Box<dyn Camera>) -> Self {
        self.cameras.attach(camera);
        self
    }

    pub fn config(&self) -> &So101Config {
        &self.config
    }

    /// `<joint>.pos` for every joint.
    pub fn default_action_features() -> FeatureMap {
        FeatureMap::floats(SO101_JOINTS.iter().map(|j| format!("{j}{POS_SUFFIX}")))
    }

    fn bus_mut(&mut self) -> Result<&mut Box<dyn ArmBus>, RobotError> {
        self.bus
            .as_mut()
            .ok_or_else(|| RobotError::NotConnected(Self::NAME.to_string()))
    }

    fn open_hardware(&mut self, calibrate: bool) -> Result<(), RobotError> {
        let port = self.config.port.clone();
        let bus = self.bus.as_mut().ok_or_else(|| {
            RobotError::Connection(format!(
                "{}: no servo bus attached for {port} (use mock mode to run without hardware)",
                Self::NAME
            ))
        })?;
        bus.open()
            .map_err(|e| RobotError::Connection(format!("{} on {port}: {e}", Self::NAME)))?;

        if !bus.is_calibrated() {
            if calibrate {
                info!(robot = Self::NAME, "running calibration");
                bus.calibrate()?;
            } else {
                warn!(robot = Self::NAME, "arm is not calibrated; positions may be wrong");
            }
        }
        bus.set_torque(true)?;
        self.cameras.open_all()
    }

    fn release_hardware(&mut self) {
        let disable_torque = self.config.disable_torque_on_disconnect;
        if let Some(bus) = self.bus.as_mut() {
            if disable_torque && let Err(e) = bus.set_torque(false) {
                warn!(robot = Self::NAME, error = %e, "failed to disable torque");
            }
            if let Err(e) = bus.close() {
                warn!(robot = Self::NAME, error = %e, "failed to close servo bus");
            }
        }
        self.cameras.close_all();
    }
}

impl Robot for So101Follower {
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
        self.bus.as_ref().is_some_and(|bus| bus.is_calibrated())
    }

    fn connect(&mut self, calibrate: bool) -> Result<(), RobotError> {
        if self.connected {
            warn!(robot = Self::NAME, "connect called on an already connected robot; ignoring");
            return Ok(());
        }
        info!(robot = Self::NAME, port = %self.config.port, mock = self.config.mock, "connecting");

        if let Err(e) = self.open_hardware(calibrate) {
            self.release_hardware();
            return Err(match e {
                RobotError::Connection(_) => e,
                other => RobotError::Connection(format!("{}: {other}", Self::NAME)),
            });
        }

        self.connected = true;
        info!(robot = Self::NAME, "connected");
        Ok(())
    }

    fn calibrate(&mut self) -> Result<(), RobotError> {
        self.ensure_connected()?;
        info!(robot = Self::NAME, "calibrating");
        self.bus_mut()?.calibrate()?;
        info!(robot = Self::NAME, "calibration complete");
        Ok(())
    }

    fn configure(&mut self) -> Result<(), RobotError> {
        self.ensure_connected()?;
        self.bus_mut()?.set_torque(true)
    }

    fn get_observation(&mut self) -> Result<Observation, RobotError> {
        self.ensure_connected()?;
        let positions = self.bus_mut()?.read_positions()?;

        let mut obs = Observation::new();
        for joint in SO101_JOINTS {
            let pos = positions
                .get(joint)
                .copied()
                .ok_or_else(|| RobotError::hardware(joint, "no position reported"))?;
            obs.insert(format!("{joint}{POS_SUFFIX}"), ObservationValue::Scalar(pos));
        }
        self.cameras.capture_into(&mut obs)?;
        Ok(obs)
    }

    fn send_action(&mut self, action: &Action) -> Result<Action, RobotError> {
        self.ensure_connected()?;
        self.action_features.validate_action(Self::NAME, action)?;

        let mut goals: BTreeMap<String, f64> = action
            .iter()
            .filter_map(|(key, value)| {
                let joint = key.strip_suffix(POS_SUFFIX)?;
                let (lo, hi) = joint_range(joint);
                Some((joint.to_string(), value.clamp(lo, hi)))
            })
            .collect();

        let max_relative_target = self.config.max_relative_target;
        let bus = self.bus_mut()?;
        if let Some(max) = max_relative_target {
            let present = bus.read_positions()?;
            for (joint, goal) in goals.iter_mut() {
                if let Some(pos) = present.get(joint) {
                    *goal = goal.clamp(pos - max, pos + max);
                }
            }
        }
        if !goals.is_empty() {
            bus.write_goal_positions(&goals)?;
        }

        Ok(goals
            .into_iter()
            .map(|(joint, goal)| (format!("{joint}{POS_SUFFIX}"), goal))
            .collect())
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
