//! `remote-robot-rpc` – talking to robots across the network.
//!
//! # Modules
//!
//! - [`protocol`] – the JSON request/response messages of a session.
//! - [`codec`] – packing of observations (camera frames included) and
//!   actions into their transport form.
//! - [`client`] – [`RemoteConnection`], a blocking WebSocket session with
//!   connect retries.
//! - [`remote`] – [`RemoteRobot`], the forwarding [`Robot`] adapter.
//! - [`so101_remote`] – [`So101Remote`], the SO-101 arm with its strategy
//!   (local or remote) chosen at construction.
//!
//! # Example
//!
//! ```rust,no_run
//! use remote_robot_hal::Robot;
//! use remote_robot_rpc::RemoteRobot;
//! use remote_robot_types::{JetbotConfig, RemoteEndpoint};
//!
//! let endpoint = RemoteEndpoint::new("192.168.1.42", 18861);
//! let mut robot = RemoteRobot::jetbot(endpoint, &JetbotConfig::default());
//! robot.connect(true)?;
//! let action = [("left_motor.value".to_string(), 0.5), ("right_motor.value".to_string(), 0.5)].into();
//! robot.send_action(&action)?;
//! println!("{:?}", robot.get_observation()?);
//! robot.disconnect()?;
//! # Ok::<(), remote_robot_types::RobotError>(())
//! ```
//!
//! [`Robot`]: remote_robot_hal::Robot

pub mod client;
pub mod codec;
pub mod protocol;
pub mod remote;
pub mod so101_remote;

pub use client::{ClientOptions, RemoteConnection};
pub use protocol::{Call, Outcome, Reply, Request, Response, ServerInfo};
pub use remote::RemoteRobot;
pub use so101_remote::So101Remote;
