//! [`So101Remote`] – an SO-101 arm that is either local or remote.
//!
//! The strategy is fixed when the adapter is built: with a
//! [`RemoteEndpoint`] every call is forwarded to a robot server, without one
//! the arm is driven through a local [`So101Follower`].

use remote_robot_hal::{Robot, So101Follower};
use remote_robot_types::{Action, FeatureMap, Observation, RemoteEndpoint, RobotError, So101Config};

use crate::client::ClientOptions;
use crate::remote::RemoteRobot;

pub enum So101Remote {
    Local(So101Follower),
    Remote(RemoteRobot),
}

impl So101Remote {
    /// Pick the strategy from `remote`.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Config`] when a local arm cannot be built from
    /// `config`.
    pub fn new(config: So101Config, remote: Option<RemoteEndpoint>) -> Result<Self, RobotError> {
        match remote {
            Some(endpoint) => Ok(Self::remote(endpoint, &config)),
            None => Self::local(config),
        }
    }

    pub fn local(config: So101Config) -> Result<Self, RobotError> {
        So101Follower::new(config).map(So101Remote::Local)
    }

    pub fn remote(endpoint: RemoteEndpoint, config: &So101Config) -> Self {
        So101Remote::Remote(RemoteRobot::so101(endpoint, config))
    }

    /// Session options of the remote strategy; ignored by a local arm.
    pub fn with_options(self, options: ClientOptions) -> Self {
        match self {
            So101Remote::Remote(robot) => So101Remote::Remote(robot.with_options(options)),
            local => local,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, So101Remote::Remote(_))
    }

    fn inner(&self) -> &dyn Robot {
        match self {
            So101Remote::Local(arm) => arm,
            So101Remote::Remote(robot) => robot,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Robot {
        match self {
            So101Remote::Local(arm) => arm,
            So101Remote::Remote(robot) => robot,
        }
    }
}

impl Robot for So101Remote {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn observation_features(&self) -> &FeatureMap {
        self.inner().observation_features()
    }

    fn action_features(&self) -> &FeatureMap {
        self.inner().action_features()
    }

    fn is_connected(&self) -> bool {
        self.inner().is_connected()
    }

    fn is_calibrated(&self) -> bool {
        self.inner().is_calibrated()
    }

    fn connect(&mut self, calibrate: bool) -> Result<(), RobotError> {
        self.inner_mut().connect(calibrate)
    }

    fn calibrate(&mut self) -> Result<(), RobotError> {
        self.inner_mut().calibrate()
    }

    fn configure(&mut self) -> Result<(), RobotError> {
        self.inner_mut().configure()
    }

    fn get_observation(&mut self) -> Result<Observation, RobotError> {
        self.inner_mut().get_observation()
    }

    fn send_action(&mut self, action: &Action) -> Result<Action, RobotError> {
        self.inner_mut().send_action(action)
    }

    fn disconnect(&mut self) -> Result<(), RobotError> {
        self.inner_mut().disconnect()
    }
}
