//! Generic `MotorDriver` trait for the Jetbot's two-channel motor board.
//!
//! The vendor driver (an I²C motor HAT on the real robot) implements this
//! trait outside this crate; [`SimMotorDriver`][crate::sim::SimMotorDriver]
//! implements it for mock mode.

use remote_robot_types::RobotError;

/// A differential-drive motor driver taking normalized speeds in `[-1, 1]`.
pub trait MotorDriver: Send {
    /// Acquire the device. Called on every robot connect.
    fn open(&mut self) -> Result<(), RobotError> {
        Ok(())
    }

    /// Command both motors at once.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::HardwareFault`] if the command cannot be
    /// written to the device.
    fn set_motors(&mut self, left: f64, right: f64) -> Result<(), RobotError>;

    /// Bring both motors to a standstill.
    fn stop(&mut self) -> Result<(), RobotError> {
        self.set_motors(0.0, 0.0)
    }

    /// Release the device. Called on every robot disconnect.
    fn close(&mut self) -> Result<(), RobotError> {
        Ok(())
    }
}
