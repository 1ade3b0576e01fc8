//! Conversion of observations and actions to their transport form.
//!
//! Scalars travel as plain JSON numbers and decode to the identical `f64`.
//! Camera frames are packed as
//! `{"shape": [h, w, c], "dtype": "uint8", "data": "<base64>"}` with the raw
//! pixel bytes, one full frame per observation.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use remote_robot_types::{Action, ImageFrame, Observation, ObservationValue, RobotError};
use serde::{Deserialize, Serialize};

/// Element type of every packed frame.
pub const IMAGE_DTYPE: &str = "uint8";

/// A camera frame in transport form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedImage {
    /// `[height, width, channels]`.
    pub shape: [u32; 3],
    pub dtype: String,
    pub data: String,
}

/// One observation entry in transport form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    Scalar(f64),
    Image(PackedImage),
}

pub type WireObservation = BTreeMap<String, WireValue>;

pub fn pack_image(frame: &ImageFrame) -> PackedImage {
    PackedImage {
        shape: [frame.height(), frame.width(), frame.channels()],
        dtype: IMAGE_DTYPE.to_string(),
        data: STANDARD.encode(frame.data()),
    }
}

/// # Errors
///
/// Returns [`RobotError::Codec`] for an unsupported dtype, invalid base64 or
/// a byte count that does not match the shape.
pub fn unpack_image(packed: PackedImage) -> Result<ImageFrame, RobotError> {
    if packed.dtype != IMAGE_DTYPE {
        return Err(RobotError::Codec(format!(
            "unsupported image dtype '{}'",
            packed.dtype
        )));
    }
    let data = STANDARD
        .decode(packed.data.as_bytes())
        .map_err(|e| RobotError::Codec(format!("image data is not valid base64: {e}")))?;
    let [height, width, channels] = packed.shape;
    ImageFrame::new(height, width, channels, data)
}

fn check_finite(key: &str, value: f64) -> Result<(), RobotError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RobotError::Codec(format!(
            "'{key}' has non-finite value {value}, which cannot be transported"
        )))
    }
}

/// # Errors
///
/// Returns [`RobotError::Codec`] for non-finite scalars, which JSON cannot
/// carry.
pub fn encode_observation(obs: &Observation) -> Result<WireObservation, RobotError> {
    obs.iter()
        .map(|(key, value)| {
            let wire = match value {
                ObservationValue::Scalar(v) => {
                    check_finite(key, *v)?;
                    WireValue::Scalar(*v)
                }
                ObservationValue::Image(frame) => WireValue::Image(pack_image(frame)),
            };
            Ok((key.clone(), wire))
        })
        .collect()
}

pub fn decode_observation(wire: WireObservation) -> Result<Observation, RobotError> {
    wire.into_iter()
        .map(|(key, value)| {
            let value = match value {
                WireValue::Scalar(v) => ObservationValue::Scalar(v),
                WireValue::Image(packed) => ObservationValue::Image(
                    unpack_image(packed)
                        .map_err(|e| RobotError::Codec(format!("observation '{key}': {e}")))?,
                ),
            };
            Ok((key, value))
        })
        .collect()
}

/// Actions are scalar-only; they pass through once every value is finite.
pub fn encode_action(action: &Action) -> Result<Action, RobotError> {
    for (key, value) in action {
        check_finite(key, *value)?;
    }
    Ok(action.clone())
}

pub fn decode_action(action: Action) -> Result<Action, RobotError> {
    for (key, value) in &action {
        check_finite(key, *value)?;
    }
    Ok(action)
}
