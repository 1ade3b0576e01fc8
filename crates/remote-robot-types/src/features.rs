//! Declared schema of a robot's action and observation dictionaries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::RobotError;
use crate::value::Action;

/// Type (and for images, shape) of one declared feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureType {
    /// A single `f64` value.
    Float,
    /// An interleaved `u8` image of shape `(height, width, channels)`.
    Image {
        height: u32,
        width: u32,
        channels: u32,
    },
}

/// Ordered mapping from dotted feature name to its [`FeatureType`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureMap(BTreeMap<String, FeatureType>);

impl FeatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map where every name is a [`FeatureType::Float`].
    pub fn floats<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            names
                .into_iter()
                .map(|n| (n.into(), FeatureType::Float))
                .collect(),
        )
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: FeatureType) {
        self.0.insert(name.into(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&FeatureType> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureType)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check that every key of `action` is a declared scalar feature and
    /// every value is finite.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Validation`] naming the first offending key.
    pub fn validate_action(&self, robot: &str, action: &Action) -> Result<(), RobotError> {
        for (key, value) in action {
            match self.0.get(key) {
                Some(FeatureType::Float) => {}
                Some(FeatureType::Image { .. }) => {
                    return Err(RobotError::validation(
                        robot,
                        format!("feature '{key}' is not a scalar action"),
                    ));
                }
                None => {
                    return Err(RobotError::validation(
                        robot,
                        format!("unknown feature '{key}'"),
                    ));
                }
            }
            if !value.is_finite() {
                return Err(RobotError::validation(
                    robot,
                    format!("feature '{key}' has non-finite value {value}"),
                ));
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, FeatureType)> for FeatureMap {
    fn from_iter<T: IntoIterator<Item = (String, FeatureType)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motors() -> FeatureMap {
        FeatureMap::floats(["left_motor.value", "right_motor.value"])
    }

    #[test]
    fn subset_of_declared_keys_is_valid() {
        let mut action = Action::new();
        action.insert("left_motor.value".to_string(), 0.5);
        assert!(motors().validate_action("jetbot", &action).is_ok());
        assert!(motors().validate_action("jetbot", &Action::new()).is_ok());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut action = Action::new();
        action.insert("left_motor.value".to_string(), 0.5);
        action.insert("nonexistent.value".to_string(), 0.1);
        let err = motors().validate_action("jetbot", &action).unwrap_err();
        match err {
            RobotError::Validation { robot, details } => {
                assert_eq!(robot, "jetbot");
                assert!(details.contains("nonexistent.value"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_finite_value_is_rejected() {
        let mut action = Action::new();
        action.insert("right_motor.value".to_string(), f64::NAN);
        assert!(matches!(
            motors().validate_action("jetbot", &action),
            Err(RobotError::Validation { .. })
        ));
    }

    #[test]
    fn image_feature_is_not_an_action() {
        let mut features = motors();
        features.insert(
            "main",
            FeatureType::Image {
                height: 2,
                width: 2,
                channels: 3,
            },
        );
        let mut action = Action::new();
        action.insert("main".to_string(), 1.0);
        assert!(features.validate_action("jetbot", &action).is_err());
    }

    #[test]
    fn feature_map_serializes_as_plain_object() {
        let json = serde_json::to_string(&motors()).unwrap();
        assert_eq!(
            json,
            r#"{"left_motor.value":{"type":"float"},"right_motor.value":{"type":"float"}}"#
        );
        let back: FeatureMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, motors());
    }
}
