//! `serve-jetbot` / `serve-so101` – host a robot until Ctrl-C.

use clap::Args;
use colored::Colorize;
use tracing::{info, warn};

use remote_robot_hal::{Jetbot, So101Follower};
use remote_robot_server::RobotServer;
use remote_robot_types::{CameraConfig, RobotError};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ServeJetbotArgs {
    /// Interface to listen on
    #[arg(long)]
    pub host: Option<String>,
    /// Port to listen on [default: 18861]
    #[arg(long)]
    pub port: Option<u16>,
    /// Use simulated motors and cameras
    #[arg(long)]
    pub mock: bool,
    /// Add a `front` camera with this width
    #[arg(long)]
    pub camera_width: Option<u32>,
    /// Add a `front` camera with this height
    #[arg(long)]
    pub camera_height: Option<u32>,
    /// Keep the robot connected when a client leaves
    #[arg(long)]
    pub no_cleanup: bool,
}

#[derive(Args, Debug)]
pub struct ServeSo101Args {
    /// Interface to listen on
    #[arg(long)]
    pub host: Option<String>,
    /// Port to listen on [default: 18862]
    #[arg(long)]
    pub port: Option<u16>,
    /// Serial device of the servo bus
    #[arg(long)]
    pub serial_port: Option<String>,
    /// Use a simulated servo bus and cameras
    #[arg(long)]
    pub mock: bool,
    /// Limit each joint move to this distance from the present position
    #[arg(long)]
    pub max_relative_target: Option<f64>,
    /// Keep the robot connected when a client leaves
    #[arg(long)]
    pub no_cleanup: bool,
}

fn hardware_unavailable(robot: &str, flag_hint: &str) -> RobotError {
    RobotError::Config(format!(
        "no {robot} hardware driver is linked into this build; rerun with {flag_hint}"
    ))
}

pub fn jetbot(cfg: &Config, args: ServeJetbotArgs) -> Result<(), RobotError> {
    let mut robot_cfg = cfg.jetbot.clone();
    robot_cfg.mock |= cfg.mock || args.mock;
    if args.camera_width.is_some() || args.camera_height.is_some() {
        let defaults = CameraConfig::default();
        robot_cfg.cameras.insert(
            "front".to_string(),
            CameraConfig::new(
                args.camera_width.unwrap_or(defaults.width),
                args.camera_height.unwrap_or(defaults.height),
            ),
        );
    }
    if !robot_cfg.mock {
        return Err(hardware_unavailable("Jetbot motor", "--mock"));
    }

    let server = RobotServer::new(Box::new(Jetbot::new(robot_cfg)), args.port.unwrap_or(cfg.jetbot_port))
        .with_host(args.host.unwrap_or_else(|| cfg.listen_host.clone()))
        .with_cleanup(!args.no_cleanup);
    serve(server)
}

pub fn so101(cfg: &Config, args: ServeSo101Args) -> Result<(), RobotError> {
    let mut robot_cfg = cfg.so101.clone();
    robot_cfg.mock |= cfg.mock || args.mock;
    if let Some(port) = args.serial_port {
        robot_cfg.port = port;
    }
    if args.max_relative_target.is_some() {
        robot_cfg.max_relative_target = args.max_relative_target;
    }
    if !robot_cfg.mock {
        return Err(hardware_unavailable("SO-101 servo bus", "--mock"));
    }

    let arm = So101Follower::new(robot_cfg)?;
    let server = RobotServer::new(Box::new(arm), args.port.unwrap_or(cfg.so101_port))
        .with_host(args.host.unwrap_or_else(|| cfg.listen_host.clone()))
        .with_cleanup(!args.no_cleanup);
    serve(server)
}

fn serve(server: RobotServer) -> Result<(), RobotError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| RobotError::Config(format!("cannot start async runtime: {e}")))?;

    runtime.block_on(async move {
        let listening = server.bind().await?;
        println!(
            "  {} listening on {}  (Ctrl-C to stop)",
            "✓".green().bold(),
            listening.local_addr().to_string().bold()
        );
        listening
            .run_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "cannot listen for Ctrl-C; serving until killed");
                    std::future::pending::<()>().await;
                }
                info!("Ctrl-C received");
            })
            .await
    })?;

    println!("  {} server stopped, robot released", "✓".green());
    Ok(())
}
