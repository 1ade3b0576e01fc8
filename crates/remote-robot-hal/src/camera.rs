//! Generic `Camera` trait and the [`CameraSet`] both robots use to manage
//! their configured cameras.

use std::collections::BTreeMap;

use remote_robot_types::{
    CameraConfig, FeatureMap, FeatureType, ImageFrame, Observation, ObservationValue, RobotError,
};
use tracing::{info, warn};

use crate::sim::SimCamera;

/// A camera or image-capture device.
pub trait Camera: Send {
    /// Stable identifier for this camera, e.g. `"main"`.
    fn id(&self) -> &str;

    fn open(&mut self) -> Result<(), RobotError>;

    fn is_open(&self) -> bool;

    /// Capture and return the latest available frame.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::HardwareFault`] if the frame cannot be captured
    /// (e.g. the device is disconnected or the buffer is unavailable).
    fn capture(&mut self) -> Result<ImageFrame, RobotError>;

    fn close(&mut self) -> Result<(), RobotError>;
}

/// The cameras declared in a robot config, paired with their drivers.
///
/// In mock mode every declared camera gets a [`SimCamera`]; otherwise
/// drivers are attached by the caller with [`CameraSet::attach`].
#[derive(Default)]
pub struct CameraSet {
    configs: BTreeMap<String, CameraConfig>,
    drivers: BTreeMap<String, Box<dyn Camera>>,
}

impl CameraSet {
    pub fn from_config(configs: &BTreeMap<String, CameraConfig>, mock: bool) -> Self {
        let mut set = Self {
            configs: configs.clone(),
            drivers: BTreeMap::new(),
        };
        if mock {
            for (name, cfg) in configs {
                set.drivers
                    .insert(name.clone(), Box::new(SimCamera::new(name.clone(), cfg)));
            }
        }
        set
    }

    /// Attach the driver for a declared camera, replacing any previous one.
    pub fn attach(&mut self, camera: Box<dyn Camera>) {
        self.drivers.insert(camera.id().to_string(), camera);
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Declare one image feature per configured camera.
    pub fn add_features(&self, features: &mut FeatureMap) {
        for (name, cfg) in &self.configs {
            features.insert(
                name.clone(),
                FeatureType::Image {
                    height: cfg.height,
                    width: cfg.width,
                    channels: CameraConfig::CHANNELS,
                },
            );
        }
    }

    /// Open every configured camera. If any camera fails, the ones already
    /// opened are closed again.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Connection`] naming the failing camera.
    pub fn open_all(&mut self) -> Result<(), RobotError> {
        let names: Vec<String> = self.configs.keys().cloned().collect();
        for name in names {
            let result = match self.drivers.get_mut(&name) {
                Some(cam) => {
                    info!(camera = %name, "opening camera");
                    cam.open()
                        .map_err(|e| RobotError::Connection(format!("camera '{name}': {e}")))
                }
                None => Err(RobotError::Connection(format!(
                    "camera '{name}' has no driver attached"
                ))),
            };
            if let Err(e) = result {
                self.close_all();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Close every open camera, logging (not returning) failures.
    pub fn close_all(&mut self) {
        for (name, cam) in self.drivers.iter_mut() {
            if !cam.is_open() {
                continue;
            }
            info!(camera = %name, "closing camera");
            if let Err(e) = cam.close() {
                warn!(camera = %name, error = %e, "failed to close camera");
            }
        }
    }

    /// Capture one frame per configured camera into `obs`.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::HardwareFault`] when a camera fails or delivers
    /// a frame whose shape differs from its configuration.
    pub fn capture_into(&mut self, obs: &mut Observation) -> Result<(), RobotError> {
        for (name, cfg) in &self.configs {
            let cam = self
                .drivers
                .get_mut(name)
                .ok_or_else(|| RobotError::hardware(name, "no driver attached"))?;
            let frame = cam.capture()?;
            if frame.height() != cfg.height
                || frame.width() != cfg.width
                || frame.channels() != CameraConfig::CHANNELS
            {
                return Err(RobotError::hardware(
                    name,
                    format!(
                        "frame shape ({}, {}, {}) does not match configured ({}, {}, {})",
                        frame.height(),
                        frame.width(),
                        frame.channels(),
                        cfg.height,
                        cfg.width,
                        CameraConfig::CHANNELS
                    ),
                ));
            }
            obs.insert(name.clone(), ObservationValue::Image(frame));
        }
        Ok(())
    }
}
