//! Immutable configuration records describing how to reach each robot.
//!
//! Every field has a serde default so partial TOML tables deserialize into a
//! usable config.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Default listening port of the Jetbot server.
pub const DEFAULT_JETBOT_PORT: u16 = 18861;

/// Default listening port of the SO-101 server.
pub const DEFAULT_SO101_PORT: u16 = 18862;

/// Where a camera's frames come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CameraSource {
    /// Video device index, e.g. `0` for `/dev/video0`.
    Index(u32),
    /// Device path or stream URL.
    Path(String),
}

impl Default for CameraSource {
    fn default() -> Self {
        CameraSource::Index(0)
    }
}

/// Resolution and source of one camera. Frames are always 3-channel `u8`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
    #[serde(default)]
    pub source: CameraSource,
}

impl CameraConfig {
    /// Number of colour channels in every frame.
    pub const CHANNELS: u32 = 3;

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: default_camera_width(),
            height: default_camera_height(),
            fps: default_camera_fps(),
            source: CameraSource::default(),
        }
    }
}

fn default_camera_width() -> u32 {
    224
}
fn default_camera_height() -> u32 {
    224
}
fn default_camera_fps() -> u32 {
    30
}
fn default_true() -> bool {
    true
}
fn default_serial_port() -> String {
    "/dev/ttyUSB0".to_string()
}

/// Configuration of the differential-drive Jetbot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JetbotConfig {
    /// Replace the motor driver and cameras with simulated ones.
    #[serde(default)]
    pub mock: bool,

    /// Stop the motors when the robot is disconnected.
    #[serde(default = "default_true")]
    pub disable_motors_on_disconnect: bool,

    #[serde(default)]
    pub cameras: BTreeMap<String, CameraConfig>,
}

impl JetbotConfig {
    /// A mock Jetbot without cameras.
    pub fn mock() -> Self {
        Self {
            mock: true,
            ..Self::default()
        }
    }

    /// Builder-style camera registration.
    pub fn with_camera(mut self, name: impl Into<String>, camera: CameraConfig) -> Self {
        self.cameras.insert(name.into(), camera);
        self
    }
}

impl Default for JetbotConfig {
    fn default() -> Self {
        Self {
            mock: false,
            disable_motors_on_disconnect: true,
            cameras: BTreeMap::new(),
        }
    }
}

/// Configuration of the SO-101 follower arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct So101Config {
    /// Serial device of the servo bus on the machine holding the arm.
    #[serde(default = "default_serial_port")]
    pub port: String,

    /// Replace the servo bus and cameras with simulated ones.
    #[serde(default)]
    pub mock: bool,

    /// Release servo torque when the arm is disconnected.
    #[serde(default = "default_true")]
    pub disable_torque_on_disconnect: bool,

    /// Maximum distance a joint may be commanded away from its present
    /// position in one action, in normalized units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_relative_target: Option<f64>,

    #[serde(default)]
    pub cameras: BTreeMap<String, CameraConfig>,
}

impl So101Config {
    /// A mock arm without cameras.
    pub fn mock() -> Self {
        Self {
            mock: true,
            ..Self::default()
        }
    }
}

impl Default for So101Config {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            mock: false,
            disable_torque_on_disconnect: true,
            max_relative_target: None,
            cameras: BTreeMap::new(),
        }
    }
}

/// Host and port of a robot server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    pub host: String,
    pub port: u16,
}

impl RemoteEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
