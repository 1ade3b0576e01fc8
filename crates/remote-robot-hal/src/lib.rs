//! `remote-robot-hal` – robots that own their hardware.
//!
//! # Modules
//!
//! - [`robot`] – the [`Robot`] contract every adapter implements.
//! - [`motor`], [`arm_bus`], [`camera`] – hardware seams. Real drivers live
//!   outside this crate and plug in through these traits.
//! - [`sim`] – simulated drivers used in mock mode and in tests.
//! - [`jetbot`] – the differential-drive [`Jetbot`].
//! - [`so101`] – the 6-axis [`So101Follower`] arm.

pub mod arm_bus;
pub mod camera;
pub mod jetbot;
pub mod motor;
pub mod robot;
pub mod sim;
pub mod so101;

pub use arm_bus::{ArmBus, SO101_JOINTS};
pub use camera::{Camera, CameraSet};
pub use jetbot::Jetbot;
pub use motor::MotorDriver;
pub use robot::Robot;
pub use so101::So101Follower;
