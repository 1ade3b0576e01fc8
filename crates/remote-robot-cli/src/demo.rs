//! `jetbot-demo` / `so101-demo` – short scripted sessions against a robot.
//!
//! Both demos stop the robot and disconnect when Ctrl-C is pressed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Args;
use colored::Colorize;
use tracing::warn;

use remote_robot_hal::{Jetbot, Robot};
use remote_robot_rpc::{RemoteRobot, So101Remote};
use remote_robot_types::{Action, Observation, ObservationValue, RemoteEndpoint, RobotError};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct JetbotDemoArgs {
    /// Robot server to connect to; drives a local Jetbot when omitted
    #[arg(long)]
    pub host: Option<String>,
    /// Server port [default: 18861]
    #[arg(long)]
    pub port: Option<u16>,
    /// Use simulated motors when running locally
    #[arg(long)]
    pub mock: bool,
    /// Seconds spent on each manoeuvre
    #[arg(long, default_value_t = 1.0)]
    pub step_secs: f64,
}

#[derive(Args, Debug)]
pub struct So101DemoArgs {
    /// Robot server to connect to; drives a local arm when omitted
    #[arg(long)]
    pub host: Option<String>,
    /// Server port [default: 18862]
    #[arg(long)]
    pub port: Option<u16>,
    /// Use a simulated arm when running locally
    #[arg(long)]
    pub mock: bool,
}

/// Install a Ctrl-C handler that raises the returned flag.
fn stop_flag() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping robot …".yellow().bold());
        handler_flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the demo can only stop on its own");
    }
    stop
}

fn print_observation(obs: &Observation) {
    for (key, value) in obs {
        match value {
            ObservationValue::Scalar(v) => println!("    {:<22} {:+.3}", key, v),
            ObservationValue::Image(frame) => println!(
                "    {:<22} {}×{}×{} image",
                key,
                frame.height(),
                frame.width(),
                frame.channels()
            ),
        }
    }
}

fn action(pairs: &[(&str, f64)]) -> Action {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Disconnect after a run. A failed run keeps its own error; a failed
/// disconnect is then only logged.
fn finish(robot: &mut dyn Robot, run: Result<(), RobotError>) -> Result<(), RobotError> {
    let disconnected = robot.disconnect();
    match (run, disconnected) {
        (Err(e), Err(disconnect_err)) => {
            warn!(robot = %robot.name(), error = %disconnect_err, "disconnect after failed run also failed");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), Err(disconnect_err)) => Err(disconnect_err),
        (Ok(()), Ok(())) => {
            println!("  {} disconnected", "✓".green());
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Jetbot
// ─────────────────────────────────────────────────────────────────────────────

pub fn jetbot(cfg: &Config, args: JetbotDemoArgs) -> Result<(), RobotError> {
    let host = args.host.or_else(|| cfg.remote_host.clone());
    let mut robot: Box<dyn Robot> = match host {
        Some(host) => {
            let endpoint = RemoteEndpoint::new(host, args.port.unwrap_or(cfg.jetbot_port));
            println!("  Connecting to Jetbot at {}", endpoint.to_string().bold());
            Box::new(RemoteRobot::jetbot(endpoint, &cfg.jetbot))
        }
        None => {
            let mut local = cfg.jetbot.clone();
            local.mock |= cfg.mock || args.mock;
            if !local.mock {
                return Err(RobotError::Config(
                    "no Jetbot motor driver is linked into this build; pass --host or --mock".to_string(),
                ));
            }
            println!("  No host given; driving a {} Jetbot", "mock".bold());
            Box::new(Jetbot::new(local))
        }
    };

    let step = Duration::try_from_secs_f64(args.step_secs)
        .map_err(|e| RobotError::Config(format!("invalid --step-secs: {e}")))?;
    let stop = stop_flag();

    robot.connect(true)?;
    let result = drive_pattern(robot.as_mut(), &stop, step);
    if let Err(e) = robot.send_action(&action(&[("left_motor.value", 0.0), ("right_motor.value", 0.0)])) {
        warn!(error = %e, "failed to stop motors");
    }
    finish(robot.as_mut(), result)
}

fn drive_pattern(robot: &mut dyn Robot, stop: &AtomicBool, step: Duration) -> Result<(), RobotError> {
    let manoeuvres = [
        ("forward", 0.3, 0.3),
        ("turn left", -0.3, 0.3),
        ("turn right", 0.3, -0.3),
        ("backward", -0.3, -0.3),
    ];
    for (label, left, right) in manoeuvres {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        println!("  {} {}", "→".cyan(), label.bold());
        let applied =
            robot.send_action(&action(&[("left_motor.value", left), ("right_motor.value", right)]))?;
        println!("    applied {:?}", applied);
        sleep_unless_stopped(step, stop);
        print_observation(&robot.get_observation()?);
    }
    Ok(())
}

fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    let tick = Duration::from_millis(50);
    let mut waited = Duration::ZERO;
    while waited < total && !stop.load(Ordering::SeqCst) {
        thread::sleep(tick.min(total - waited));
        waited += tick;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SO-101
// ─────────────────────────────────────────────────────────────────────────────

pub fn so101(cfg: &Config, args: So101DemoArgs) -> Result<(), RobotError> {
    let endpoint = args
        .host
        .or_else(|| cfg.remote_host.clone())
        .map(|host| RemoteEndpoint::new(host, args.port.unwrap_or(cfg.so101_port)));
    let mut arm_cfg = cfg.so101.clone();
    arm_cfg.mock |= cfg.mock || args.mock;

    let mut arm = So101Remote::new(arm_cfg, endpoint)?;
    if arm.is_remote() {
        println!("  Driving a {} SO-101 arm", "remote".bold());
    } else {
        println!("  Driving a {} SO-101 arm", "local".bold());
    }
    let stop = stop_flag();

    arm.connect(true)?;
    let result = wave(&mut arm, &stop, Duration::from_millis(500)).map(|_| ());
    finish(&mut arm, result)
}

/// Run the wave; returns the applied value of every pose that was sent.
fn wave(arm: &mut So101Remote, stop: &AtomicBool, pause: Duration) -> Result<Vec<Action>, RobotError> {
    let obs = arm.get_observation()?;
    println!("  Present position:");
    print_observation(&obs);
    let start = obs
        .get("shoulder_pan.pos")
        .and_then(ObservationValue::as_scalar)
        .unwrap_or(0.0);

    let poses = [
        ("pan +15", action(&[("shoulder_pan.pos", start + 15.0)])),
        ("open gripper", action(&[("gripper.pos", 60.0)])),
        ("close gripper", action(&[("gripper.pos", 5.0)])),
        ("pan back", action(&[("shoulder_pan.pos", start)])),
    ];
    let mut sent = Vec::with_capacity(poses.len());
    for (label, pose) in poses {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        println!("  {} {}", "→".cyan(), label.bold());
        let applied = arm.send_action(&pose)?;
        println!("    applied {:?}", applied);
        sent.push(applied);
        sleep_unless_stopped(pause, stop);
    }
    println!("  Final position:");
    print_observation(&arm.get_observation()?);
    Ok(sent)
}
