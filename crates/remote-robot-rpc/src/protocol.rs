//! JSON messages exchanged over a robot session.
//!
//! Every WebSocket text frame carries exactly one [`Request`] (client →
//! server) or one [`Response`] (server → client):
//!
//! ```json
//! {"id": 7, "call": {"method": "send_action", "params": {"action": {"left_motor.value": 0.5}}}}
//! {"id": 7, "outcome": {"ok": {"type": "action", "value": {"left_motor.value": 0.5}}}}
//! {"id": 8, "outcome": {"err": {"kind": "not_connected", "detail": "jetbot"}}}
//! ```
//!
//! A frame the server cannot parse is answered with a `protocol` error
//! carrying id `0`.

use remote_robot_types::{Action, FeatureMap, RobotError};
use serde::{Deserialize, Serialize};

use crate::codec::WireObservation;

/// Id used for replies to requests whose own id could not be read.
pub const UNKNOWN_REQUEST_ID: u64 = 0;

/// One forwarded robot method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum Call {
    Connect { calibrate: bool },
    Disconnect,
    GetObservation,
    SendAction { action: Action },
    IsConnected,
    IsCalibrated,
    Calibrate,
    Configure,
    ObservationFeatures,
    ActionFeatures,
    /// Liveness check answered by the server itself.
    Ping,
}

impl Call {
    /// Wire name of the method, for logs and error messages.
    pub fn method(&self) -> &'static str {
        match self {
            Call::Connect { .. } => "connect",
            Call::Disconnect => "disconnect",
            Call::GetObservation => "get_observation",
            Call::SendAction { .. } => "send_action",
            Call::IsConnected => "is_connected",
            Call::IsCalibrated => "is_calibrated",
            Call::Calibrate => "calibrate",
            Call::Configure => "configure",
            Call::ObservationFeatures => "observation_features",
            Call::ActionFeatures => "action_features",
            Call::Ping => "ping",
        }
    }
}

/// Identity of the server and of the session answering a `ping`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Name of the hosted robot.
    pub robot: String,
    pub session_id: String,
    /// RFC 3339 timestamp of the session handshake.
    pub connected_at: String,
    pub server_version: String,
}

/// Successful result of a [`Call`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Reply {
    Unit,
    Bool(bool),
    Observation(WireObservation),
    Action(Action),
    Features(FeatureMap),
    ServerInfo(ServerInfo),
}

impl Reply {
    fn kind(&self) -> &'static str {
        match self {
            Reply::Unit => "unit",
            Reply::Bool(_) => "bool",
            Reply::Observation(_) => "observation",
            Reply::Action(_) => "action",
            Reply::Features(_) => "features",
            Reply::ServerInfo(_) => "server_info",
        }
    }

    fn unexpected(self, wanted: &str) -> RobotError {
        RobotError::Protocol(format!("expected a {wanted} reply, got {}", self.kind()))
    }

    pub fn into_unit(self) -> Result<(), RobotError> {
        match self {
            Reply::Unit => Ok(()),
            other => Err(other.unexpected("unit")),
        }
    }

    pub fn into_bool(self) -> Result<bool, RobotError> {
        match self {
            Reply::Bool(b) => Ok(b),
            other => Err(other.unexpected("bool")),
        }
    }

    pub fn into_observation(self) -> Result<WireObservation, RobotError> {
        match self {
            Reply::Observation(obs) => Ok(obs),
            other => Err(other.unexpected("observation")),
        }
    }

    pub fn into_action(self) -> Result<Action, RobotError> {
        match self {
            Reply::Action(action) => Ok(action),
            other => Err(other.unexpected("action")),
        }
    }

    pub fn into_features(self) -> Result<FeatureMap, RobotError> {
        match self {
            Reply::Features(features) => Ok(features),
            other => Err(other.unexpected("features")),
        }
    }

    pub fn into_server_info(self) -> Result<ServerInfo, RobotError> {
        match self {
            Reply::ServerInfo(info) => Ok(info),
            other => Err(other.unexpected("server_info")),
        }
    }
}

/// Client → server frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub call: Call,
}

/// Either the reply or the robot's error, marshalled unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok(Reply),
    Err(RobotError),
}

impl From<Result<Reply, RobotError>> for Outcome {
    fn from(result: Result<Reply, RobotError>) -> Self {
        match result {
            Ok(reply) => Outcome::Ok(reply),
            Err(e) => Outcome::Err(e),
        }
    }
}

impl Outcome {
    pub fn into_result(self) -> Result<Reply, RobotError> {
        match self {
            Outcome::Ok(reply) => Ok(reply),
            Outcome::Err(e) => Err(e),
        }
    }
}

/// Server → client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub outcome: Outcome,
}

impl Response {
    pub fn new(id: u64, result: Result<Reply, RobotError>) -> Self {
        Self {
            id,
            outcome: result.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_wire_shape() {
        let req = Request {
            id: 3,
            call: Call::Connect { calibrate: true },
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"id": 3, "call": {"method": "connect", "params": {"calibrate": true}}})
        );
    }

    #[test]
    fn parameterless_call_parses_without_params() {
        let req: Request =
            serde_json::from_str(r#"{"id": 1, "call": {"method": "get_observation"}}"#).unwrap();
        assert_eq!(req.call, Call::GetObservation);
        assert_eq!(req.call.method(), "get_observation");
    }

    #[test]
    fn unknown_method_is_rejected() {
        let parsed = serde_json::from_str::<Request>(r#"{"id": 1, "call": {"method": "self_destruct"}}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn error_outcome_keeps_kind() {
        let resp = Response::new(9, Err(RobotError::NotConnected("jetbot".to_string())));
        let text = serde_json::to_string(&resp).unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&text).unwrap(),
            json!({"id": 9, "outcome": {"err": {"kind": "not_connected", "detail": "jetbot"}}})
        );
        let back: Response = serde_json::from_str(&text).unwrap();
        assert_eq!(
            back.outcome.into_result(),
            Err(RobotError::NotConnected("jetbot".to_string()))
        );
    }

    #[test]
    fn unit_reply_shape() {
        let resp = Response::new(2, Ok(Reply::Unit));
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"id": 2, "outcome": {"ok": {"type": "unit"}}})
        );
    }

    #[test]
    fn reply_accessors_reject_wrong_variant() {
        assert_eq!(Reply::Bool(true).into_bool(), Ok(true));
        assert!(matches!(Reply::Unit.into_bool(), Err(RobotError::Protocol(_))));
        assert!(matches!(
            Reply::Bool(false).into_features(),
            Err(RobotError::Protocol(msg)) if msg.contains("features")
        ));
    }
}
