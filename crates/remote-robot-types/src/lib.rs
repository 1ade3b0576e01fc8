//! Shared vocabulary of the remote-robot workspace: configuration records,
//! feature schemas, observation/action values and the [`RobotError`]
//! taxonomy that every crate (and the wire protocol) speaks.

pub mod config;
pub mod features;
pub mod value;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use config::{
    CameraConfig, CameraSource, DEFAULT_JETBOT_PORT, DEFAULT_SO101_PORT, JetbotConfig,
    RemoteEndpoint, So101Config,
};
pub use features::{FeatureMap, FeatureType};
pub use value::{Action, ImageFrame, Observation, ObservationValue};

/// Error type shared by local adapters, the remote client and the server.
///
/// It is serializable so a failure raised next to the hardware reaches the
/// remote caller with its kind intact.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RobotError {
    /// Hardware or transport could not be reached while connecting.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The call needs a connected robot.
    #[error("{0} is not connected")]
    NotConnected(String),

    /// An action referenced a feature the robot does not declare, or
    /// carried an unusable value.
    #[error("Invalid action for {robot}: {details}")]
    Validation { robot: String, details: String },

    /// A remote call failed after the session was established.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    /// Observation or action payload could not be packed or unpacked.
    #[error("Codec error: {0}")]
    Codec(String),

    /// The peer sent something that is not a valid protocol message.
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RobotError {
    /// Convenience constructor for [`RobotError::HardwareFault`].
    pub fn hardware(component: impl Into<String>, details: impl Into<String>) -> Self {
        Self::HardwareFault {
            component: component.into(),
            details: details.into(),
        }
    }

    /// Convenience constructor for [`RobotError::Validation`].
    pub fn validation(robot: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Validation {
            robot: robot.into(),
            details: details.into(),
        }
    }
}
