//! `remote-robot` – serve robots over the network and drive them remotely.
//!
//! ```bash
//! # On the machine wired to the robot
//! remote-robot serve-jetbot --mock --camera-width 320 --camera-height 240
//! remote-robot serve-so101 --serial-port /dev/ttyACM0
//!
//! # Anywhere on the network
//! remote-robot jetbot-demo --host 192.168.1.42
//! remote-robot so101-demo --host 192.168.1.42
//! ```
//!
//! Settings come from `~/.remote-robot/config.toml` (or `--config`), then
//! `REMOTE_ROBOT_*` environment variables, then command-line flags.

mod config;
mod demo;
mod serve;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use remote_robot_types::RobotError;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "remote-robot")]
#[command(about = "Serve robots over the network and drive them remotely", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file [default: ~/.remote-robot/config.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Host a Jetbot for one remote client at a time
    ServeJetbot(serve::ServeJetbotArgs),

    /// Host an SO-101 arm for one remote client at a time
    #[command(name = "serve-so101")]
    ServeSo101(serve::ServeSo101Args),

    /// Drive a Jetbot through a short square pattern
    JetbotDemo(demo::JetbotDemoArgs),

    /// Move an SO-101 arm through a few poses
    #[command(name = "so101-demo")]
    So101Demo(demo::So101DemoArgs),

    /// Write the current settings to the config file for editing
    ConfigInit {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn config_init(cfg: &config::Config, path: Option<&std::path::Path>, force: bool) -> Result<(), String> {
    let written = config::init(cfg, path, force)?;
    println!("\n  {} Config saved to {}\n", "✓".green().bold(), written.display().to_string().bold());
    Ok(())
}

fn init_logging() {
    // RUST_LOG picks the filter (default "info"); REMOTE_ROBOT_LOG_FORMAT=json
    // switches to newline-delimited JSON.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if std::env::var("REMOTE_ROBOT_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let cfg = match config::resolve(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    println!();
    println!(
        "  {} {}",
        "remote-robot".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );

    let result = match cli.command {
        Commands::ServeJetbot(args) => serve::jetbot(&cfg, args),
        Commands::ServeSo101(args) => serve::so101(&cfg, args),
        Commands::JetbotDemo(args) => demo::jetbot(&cfg, args),
        Commands::So101Demo(args) => demo::so101(&cfg, args),
        Commands::ConfigInit { force } => {
            config_init(&cfg, cli.config.as_deref(), force).map_err(RobotError::Config)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
