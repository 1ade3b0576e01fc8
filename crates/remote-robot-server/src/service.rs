//! Maps one protocol [`Call`] onto the hosted [`Robot`].

use remote_robot_hal::Robot;
use remote_robot_rpc::codec::{decode_action, encode_action, encode_observation};
use remote_robot_rpc::{Call, Reply, ServerInfo};
use remote_robot_types::RobotError;

/// Run `call` against `robot`. Robot errors are returned unchanged so they
/// reach the client with their original kind.
pub fn dispatch(robot: &mut dyn Robot, call: Call, session: &ServerInfo) -> Result<Reply, RobotError> {
    match call {
        Call::Connect { calibrate } => robot.connect(calibrate).map(|()| Reply::Unit),
        Call::Disconnect => robot.disconnect().map(|()| Reply::Unit),
        Call::GetObservation => {
            let obs = robot.get_observation()?;
            Ok(Reply::Observation(encode_observation(&obs)?))
        }
        Call::SendAction { action } => {
            let action = decode_action(action)?;
            let applied = robot.send_action(&action)?;
            Ok(Reply::Action(encode_action(&applied)?))
        }
        Call::IsConnected => Ok(Reply::Bool(robot.is_connected())),
        Call::IsCalibrated => Ok(Reply::Bool(robot.is_calibrated())),
        Call::Calibrate => robot.calibrate().map(|()| Reply::Unit),
        Call::Configure => robot.configure().map(|()| Reply::Unit),
        Call::ObservationFeatures => Ok(Reply::Features(robot.observation_features().clone())),
        Call::ActionFeatures => Ok(Reply::Features(robot.action_features().clone())),
        Call::Ping => Ok(Reply::ServerInfo(session.clone())),
    }
}
