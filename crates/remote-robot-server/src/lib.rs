//! `remote-robot-server` – exposes one robot to remote clients.
//!
//! The process that owns the hardware builds a robot, hands it to a
//! [`RobotServer`] and serves it over WebSocket. Clients speak the protocol
//! of [`remote_robot_rpc::protocol`], normally through
//! [`remote_robot_rpc::RemoteRobot`].
//!
//! 1. **One client at a time.** A second client is refused with HTTP 503
//!    during the handshake and may retry once the first one leaves.
//! 2. **Errors travel unchanged.** A robot call that fails is answered with
//!    the same [`RobotError`] kind and message.
//! 3. **Safe state between clients.** A robot left connected by a departing
//!    client is disconnected so its motors stop.
//!
//! ```rust,no_run
//! use remote_robot_hal::So101Follower;
//! use remote_robot_server::RobotServer;
//! use remote_robot_types::{DEFAULT_SO101_PORT, So101Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), remote_robot_types::RobotError> {
//!     let arm = So101Follower::new(So101Config::mock())?;
//!     let server = RobotServer::new(Box::new(arm), DEFAULT_SO101_PORT).bind().await?;
//!     println!("serving on {}", server.local_addr());
//!     server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! }
//! ```
//!
//! [`RobotError`]: remote_robot_types::RobotError

pub mod server;
pub mod service;

pub use server::{DEFAULT_HOST, ListeningServer, RobotServer, SharedRobot};
