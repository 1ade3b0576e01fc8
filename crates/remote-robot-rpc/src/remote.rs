//! [`RemoteRobot`] – a [`Robot`] whose hardware lives behind a server.
//!
//! Every call is forwarded synchronously over a [`RemoteConnection`]. Errors
//! raised next to the hardware come back with their original kind; a broken
//! session surfaces as [`RobotError::Transport`]. Nothing is retried.

use std::collections::BTreeMap;

use remote_robot_hal::{CameraSet, Jetbot, Robot, So101Follower};
use remote_robot_types::{
    Action, CameraConfig, FeatureMap, JetbotConfig, Observation, RemoteEndpoint, RobotError,
    So101Config,
};
use tracing::{info, warn};

use crate::client::{ClientOptions, RemoteConnection};
use crate::codec::{decode_action, decode_observation, encode_action};
use crate::protocol::{Call, Reply};

/// Forwarding adapter for any robot hosted by a robot server.
pub struct RemoteRobot {
    name: String,
    endpoint: RemoteEndpoint,
    options: ClientOptions,
    session: Option<RemoteConnection>,
    observation_features: FeatureMap,
    action_features: FeatureMap,
    calibrated: bool,
}

/// State fetched from the server right after `connect`.
struct Handshake {
    observation_features: FeatureMap,
    action_features: FeatureMap,
    calibrated: bool,
}

fn with_cameras(mut features: FeatureMap, cameras: &BTreeMap<String, CameraConfig>) -> FeatureMap {
    CameraSet::from_config(cameras, false).add_features(&mut features);
    features
}

impl RemoteRobot {
    /// A remote robot named `name`, reporting the given feature maps until
    /// the server's own maps are fetched on connect.
    pub fn new(
        name: impl Into<String>,
        endpoint: RemoteEndpoint,
        observation_features: FeatureMap,
        action_features: FeatureMap,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint,
            options: ClientOptions::default(),
            session: None,
            observation_features,
            action_features,
            calibrated: false,
        }
    }

    /// A Jetbot hosted at `endpoint`, with default features derived from
    /// `config`.
    pub fn jetbot(endpoint: RemoteEndpoint, config: &JetbotConfig) -> Self {
        let action = Jetbot::default_action_features();
        let observation = with_cameras(action.clone(), &config.cameras);
        Self::new(Jetbot::NAME, endpoint, observation, action)
    }

    /// An SO-101 arm hosted at `endpoint`, with default features derived
    /// from `config`.
    pub fn so101(endpoint: RemoteEndpoint, config: &So101Config) -> Self {
        let action = So101Follower::default_action_features();
        let observation = with_cameras(action.clone(), &config.cameras);
        Self::new(So101Follower::NAME, endpoint, observation, action)
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn endpoint(&self) -> &RemoteEndpoint {
        &self.endpoint
    }

    fn forward(&mut self, call: Call) -> Result<Reply, RobotError> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| RobotError::NotConnected(self.name.clone()))?;
        session.call(call)
    }

    fn handshake(session: &mut RemoteConnection, calibrate: bool) -> Result<Handshake, RobotError> {
        session.call(Call::Connect { calibrate })?.into_unit()?;
        Ok(Handshake {
            observation_features: session.call(Call::ObservationFeatures)?.into_features()?,
            action_features: session.call(Call::ActionFeatures)?.into_features()?,
            calibrated: session.call(Call::IsCalibrated)?.into_bool()?,
        })
    }
}

impl Robot for RemoteRobot {
    fn name(&self) -> &str {
        &self.name
    }

    fn observation_features(&self) -> &FeatureMap {
        &self.observation_features
    }

    fn action_features(&self) -> &FeatureMap {
        &self.action_features
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    fn connect(&mut self, calibrate: bool) -> Result<(), RobotError> {
        if self.session.is_some() {
            warn!(robot = %self.name, "connect called on an already connected robot; ignoring");
            return Ok(());
        }
        info!(robot = %self.name, endpoint = %self.endpoint, "connecting to remote robot");

        let mut session = RemoteConnection::open(&self.endpoint, &self.options)?;
        match Self::handshake(&mut session, calibrate) {
            Ok(state) => {
                self.observation_features = state.observation_features;
                self.action_features = state.action_features;
                self.calibrated = state.calibrated;
                self.session = Some(session);
                info!(robot = %self.name, endpoint = %self.endpoint, "connected");
                Ok(())
            }
            Err(e) => {
                session.close();
                Err(match e {
                    RobotError::Connection(_) => e,
                    other => RobotError::Connection(format!(
                        "{} at {}: {other}",
                        self.name, self.endpoint
                    )),
                })
            }
        }
    }

    fn calibrate(&mut self) -> Result<(), RobotError> {
        self.forward(Call::Calibrate)?.into_unit()?;
        self.calibrated = self.forward(Call::IsCalibrated)?.into_bool()?;
        Ok(())
    }

    fn configure(&mut self) -> Result<(), RobotError> {
        self.forward(Call::Configure)?.into_unit()
    }

    fn get_observation(&mut self) -> Result<Observation, RobotError> {
        let wire = self.forward(Call::GetObservation)?.into_observation()?;
        decode_observation(wire)
    }

    fn send_action(&mut self, action: &Action) -> Result<Action, RobotError> {
        self.ensure_connected()?;
        let action = encode_action(action)?;
        let applied = self.forward(Call::SendAction { action })?.into_action()?;
        decode_action(applied)
    }

    fn disconnect(&mut self) -> Result<(), RobotError> {
        let Some(mut session) = self.session.take() else {
            return Err(RobotError::NotConnected(self.name.clone()));
        };
        info!(robot = %self.name, endpoint = %self.endpoint, "disconnecting from remote robot");
        if let Err(e) = session.call(Call::Disconnect).and_then(Reply::into_unit) {
            warn!(robot = %self.name, error = %e, "remote disconnect failed");
        }
        session.close();
        Ok(())
    }
}
