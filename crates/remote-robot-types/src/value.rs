//! Transient action and observation values exchanged on every call.

use std::collections::BTreeMap;

use crate::RobotError;
use crate::features::FeatureType;

/// Feature name → commanded value, e.g. `"left_motor.value" → 0.5`.
pub type Action = BTreeMap<String, f64>;

/// Feature name → observed value (motor state or camera frame).
pub type Observation = BTreeMap<String, ObservationValue>;

/// A raw camera frame: row-major, channel-interleaved `u8` pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    height: u32,
    width: u32,
    channels: u32,
    data: Vec<u8>,
}

impl ImageFrame {
    /// Wrap `data` as a `height × width × channels` frame.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Codec`] when the buffer length does not match
    /// the shape, or the shape itself does not fit in memory.
    pub fn new(height: u32, width: u32, channels: u32, data: Vec<u8>) -> Result<Self, RobotError> {
        let expected = (height as usize)
            .checked_mul(width as usize)
            .and_then(|n| n.checked_mul(channels as usize))
            .ok_or_else(|| {
                RobotError::Codec(format!(
                    "frame shape ({height}, {width}, {channels}) is too large"
                ))
            })?;
        if data.len() != expected {
            return Err(RobotError::Codec(format!(
                "frame of shape ({height}, {width}, {channels}) needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            height,
            width,
            channels,
            data,
        })
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// The [`FeatureType::Image`] describing this frame's shape.
    pub fn feature_type(&self) -> FeatureType {
        FeatureType::Image {
            height: self.height,
            width: self.width,
            channels: self.channels,
        }
    }
}

/// One entry of an [`Observation`].
#[derive(Debug, Clone, PartialEq)]
pub enum ObservationValue {
    Scalar(f64),
    Image(ImageFrame),
}

impl ObservationValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ObservationValue::Scalar(v) => Some(*v),
            ObservationValue::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageFrame> {
        match self {
            ObservationValue::Image(frame) => Some(frame),
            ObservationValue::Scalar(_) => None,
        }
    }
}

impl From<f64> for ObservationValue {
    fn from(v: f64) -> Self {
        ObservationValue::Scalar(v)
    }
}

impl From<ImageFrame> for ObservationValue {
    fn from(frame: ImageFrame) -> Self {
        ObservationValue::Image(frame)
    }
}
