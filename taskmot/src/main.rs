//! # Task-to-Motion Bridge Binary
//!
//! Runs the supervisory bridge against the in-process simulated executor.
//!
//! # Usage
//!
//! ```bash
//! # Run until Ctrl-C
//! taskmot --config config/taskmot.toml
//!
//! # Bounded run, tracing a 10 mm square in coordinated mode
//! taskmot --config config/taskmot.toml --cycles 5000 --square 10
//!
//! # Verbose JSON logging
//! taskmot -c config/taskmot.toml -v --json
//! ```

#![deny(warnings)]

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use taskmot::config::load_config;
use taskmot::supervisor::Supervisor;
use taskmot::{BridgeResult, MotionBridge, SimulatedExecutor};
use taskmot_common::command::TrajMode;
use taskmot_common::config::LogLevel;
use taskmot_common::consts::ALL_JOINTS;
use taskmot_common::pose::Pose;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Task-to-motion bridge with a simulated executor
#[derive(Parser, Debug)]
#[command(name = "taskmot")]
#[command(version)]
#[command(about = "Supervisory command/status bridge to a motion executor")]
#[command(long_about = None)]
struct Args {
    /// Path to the configuration file (application and machine sections).
    #[arg(short, long, default_value = "config/taskmot.toml")]
    config: PathBuf,

    /// Stop after this many supervisory cycles (overrides [bridge] cycles).
    #[arg(long)]
    cycles: Option<u64>,

    /// Queue a square of this side length in coordinated mode after homing.
    #[arg(long, value_name = "SIZE")]
    square: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        // Tracing may not be installed yet if the config failed to load.
        eprintln!("taskmot failed: {e}");
        error!("taskmot failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let loaded = load_config(&args.config)?;

    setup_tracing(&args, loaded.app.shared.log_level);

    info!(
        service = %loaded.app.shared.service_name,
        "taskmot v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let settings = loaded.app.bridge.clone();
    let sim = SimulatedExecutor::new();
    let mut bridge = MotionBridge::new(sim.clone(), Arc::new(loaded.machine));
    bridge.set_debug_flags(settings.debug_flags());
    bridge.set_debug_info(settings.debug_info);

    if let Err(e) = bridge.motion_init() {
        warn!("Motion init incomplete: {}", e);
    }
    enable_and_home(&mut bridge)?;
    if let Some(size) = args.square {
        queue_square(&mut bridge, size)?;
    }

    let ticker = sim.clone();
    let mut supervisor = Supervisor::new(bridge.into_shared(), settings.cycle_time())
        .with_executor_tick(move |dt| ticker.step(dt));

    let running = supervisor.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    if let Err(e) = supervisor.run(args.cycles.or(settings.cycles)) {
        error!("Supervisory loop error: {}", e);
    }

    if let Some(status) = supervisor.last_status() {
        let summary = serde_json::to_string(status)?;
        debug!(%summary, "Final motion status");
    }

    let stats = supervisor.stats();
    info!(
        cycles = stats.cycle_count,
        avg_us = stats.average_cycle_time_us(),
        max_us = stats.max_cycle_time_us,
        violations = stats.timing_violations,
        "Loop statistics"
    );

    {
        let mut bridge = supervisor.bridge().lock();
        if let Err(e) = bridge.motion_halt() {
            warn!("Motion halt incomplete: {}", e);
        }
    }

    info!("taskmot shutdown complete");
    Ok(())
}

/// Enable the planner and every configured joint, then home all joints.
fn enable_and_home(bridge: &mut MotionBridge<SimulatedExecutor>) -> BridgeResult<()> {
    bridge.traj_enable()?;
    for joint in 0..bridge.encoder().traj_joints() {
        bridge.joint_enable(joint)?;
    }
    bridge.joint_home(ALL_JOINTS)?;
    Ok(())
}

/// Queue a closed square in the XY plane.
fn queue_square(bridge: &mut MotionBridge<SimulatedExecutor>, size: f64) -> BridgeResult<()> {
    bridge.traj_set_mode(TrajMode::Coord)?;
    let vel = bridge.encoder().traj_max_velocity();
    let acc = bridge.encoder().traj_max_acceleration();
    let corners = [
        Pose::from_xyz(size, 0.0, 0.0),
        Pose::from_xyz(size, size, 0.0),
        Pose::from_xyz(0.0, size, 0.0),
        Pose::from_xyz(0.0, 0.0, 0.0),
    ];
    for (id, corner) in (1..).zip(corners) {
        bridge.traj_set_motion_id(id);
        bridge.traj_linear_move(corner, 1, vel, vel, acc, -1)?;
    }
    info!(size, "Queued square program");
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and `[shared] log_level`.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        match configured {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
