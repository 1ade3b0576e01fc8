//! `ArmBus` trait for the SO-101's serial servo bus.
//!
//! Positions are normalized: joints in `[-100, 100]`, the gripper in
//! `[0, 100]`. Converting to raw servo ticks is the bus driver's job.

use std::collections::BTreeMap;

use remote_robot_types::RobotError;

/// Joint names of the SO-101, base to tip.
pub const SO101_JOINTS: [&str; 6] = [
    "shoulder_pan",
    "shoulder_lift",
    "elbow_flex",
    "wrist_flex",
    "wrist_roll",
    "gripper",
];

/// Normalized position range of `joint`.
pub fn joint_range(joint: &str) -> (f64, f64) {
    if joint == "gripper" {
        (0.0, 100.0)
    } else {
        (-100.0, 100.0)
    }
}

/// A servo bus addressing the arm's motors by joint name.
pub trait ArmBus: Send {
    /// Open the serial port and ping every servo.
    fn open(&mut self) -> Result<(), RobotError>;

    fn close(&mut self) -> Result<(), RobotError>;

    /// Present position of every joint.
    fn read_positions(&mut self) -> Result<BTreeMap<String, f64>, RobotError>;

    /// Write goal positions for the given joints (a subset is allowed).
    fn write_goal_positions(&mut self, goals: &BTreeMap<String, f64>) -> Result<(), RobotError>;

    fn set_torque(&mut self, enable: bool) -> Result<(), RobotError>;

    /// Whether range calibration is available for every servo.
    fn is_calibrated(&self) -> bool;

    /// Record the homing offsets and range of motion of every servo.
    fn calibrate(&mut self) -> Result<(), RobotError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gripper_range_is_one_sided() {
        assert_eq!(joint_range("gripper"), (0.0, 100.0));
        assert_eq!(joint_range("elbow_flex"), (-100.0, 100.0));
    }

    #[test]
    fn six_joints_end_with_gripper() {
        assert_eq!(SO101_JOINTS.len(), 6);
        assert_eq!(SO101_JOINTS[5], "gripper");
    }
}
