//! The [`Robot`] contract: connect, observe, act, disconnect.
//!
//! Local adapters, the remote forwarding adapter and the server all talk to
//! robots exclusively through this trait, so callers never need to know
//! whether the hardware is on this machine or behind a network session.

use remote_robot_types::{Action, FeatureMap, Observation, RobotError};

/// A robot that can be connected, observed and commanded.
///
/// Every method blocks until the hardware (or remote peer) has answered.
/// Implementations are driven by one caller at a time; `&mut self` on the
/// mutating calls enforces that.
///
/// # State machine
///
/// * `connect` moves Disconnected → Connected. On a connected robot it is a
///   no-op that logs a warning. On failure the robot stays Disconnected.
/// * `disconnect` moves Connected → Disconnected and always succeeds from
///   Connected (shutdown errors are logged). On a disconnected robot it
///   returns [`RobotError::NotConnected`].
/// * `get_observation`, `send_action`, `calibrate` and `configure` require
///   Connected and return [`RobotError::NotConnected`] otherwise, without
///   touching hardware.
pub trait Robot: Send {
    /// Stable robot type name, e.g. `"jetbot"`.
    fn name(&self) -> &str;

    /// Schema of the keys returned by [`Robot::get_observation`].
    fn observation_features(&self) -> &FeatureMap;

    /// Schema of the keys accepted by [`Robot::send_action`].
    fn action_features(&self) -> &FeatureMap;

    fn is_connected(&self) -> bool;

    fn is_calibrated(&self) -> bool;

    /// Open the hardware (or session). `calibrate` allows a calibration
    /// routine to run when the robot reports itself uncalibrated.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Connection`] when the hardware or transport
    /// cannot be reached.
    fn connect(&mut self, calibrate: bool) -> Result<(), RobotError>;

    /// Run the robot's calibration routine.
    fn calibrate(&mut self) -> Result<(), RobotError>;

    /// Re-apply runtime configuration (e.g. servo torque).
    fn configure(&mut self) -> Result<(), RobotError>;

    /// Read the current state.
    fn get_observation(&mut self) -> Result<Observation, RobotError>;

    /// Command the robot and return the action actually applied, after
    /// clamping.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Validation`] for undeclared keys; the robot's
    /// state is left unchanged in that case.
    fn send_action(&mut self, action: &Action) -> Result<Action, RobotError>;

    fn disconnect(&mut self) -> Result<(), RobotError>;

    /// Fail with [`RobotError::NotConnected`] unless the robot is connected.
    fn ensure_connected(&self) -> Result<(), RobotError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(RobotError::NotConnected(self.name().to_string()))
        }
    }
}
