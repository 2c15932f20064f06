//! # CDPR Control Unit
//!
//! Loads the TOML configuration, prepares process memory, builds one drive
//! state machine per configured winch on the simulated fieldbus and runs the
//! control cycle on a cyclic real-time executor until Ctrl-C, the configured
//! run time, or a missed deadline.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use parking_lot::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cdpr_common::consts::DEFAULT_CONFIG_PATH;
use cdpr_control_unit::config::{ControlUnitConfig, load_config};
use cdpr_control_unit::cycle::{CycleError, CycleRunner, RunnerSnapshot, bind};
use cdpr_control_unit::fieldbus::Fieldbus;
use cdpr_control_unit::sim::SimulatedBus;
use cdpr_rt::executor::CyclicExecutor;
use cdpr_rt::memory::init_process_memory;

/// Monitor loop poll period.
const MONITOR_POLL: Duration = Duration::from_millis(50);

/// Interval between drive status reports.
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// CDPR Control Unit: cyclic drive control loop
#[derive(Parser, Debug)]
#[command(name = "cdpr_control_unit")]
#[command(version)]
#[command(about = "Real-time drive control loop for cable-driven parallel robots")]
struct Args {
    /// Path to the control unit configuration TOML.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the cycle period [ns].
    #[arg(long)]
    cycle_ns: Option<u64>,

    /// Pin the RT thread to this CPU (-1 = last core).
    #[arg(long, allow_negative_numbers = true)]
    cpu: Option<isize>,

    /// Run time in seconds (0 = until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    duration_s: u64,

    /// Power up every drive to OperationEnabled.
    #[arg(long)]
    enable: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let config = load_config(&args.config);

    let directive = match (&config, args.verbose) {
        (_, true) => "debug",
        (Ok(config), false) => config.shared.log_level.as_directive(),
        (Err(_), false) => "info",
    };
    setup_tracing(directive, args.json);

    info!("CDPR Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = match config {
        Ok(config) => run(&args, config),
        Err(e) => Err(e.into()),
    };
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("CDPR Control Unit shutdown complete");
}

fn run(args: &Args, mut config: ControlUnitConfig) -> Result<(), Box<dyn std::error::Error>> {
    // ── Command-line overrides ──
    if let Some(cycle_ns) = args.cycle_ns {
        config.executor.cycle_time_ns = cycle_ns;
    }
    if let Some(cpu) = args.cpu {
        config.executor.cpus = vec![cpu];
    }
    config.validate()?;

    let cpus = config.cpu_affinity()?;
    let sched = config.sched_attr()?;
    let period_ns = config.executor.cycle_time_ns;
    info!(
        "Config OK: cycle_time={period_ns}ns, drives={}, cpus={cpus}, sched={sched}",
        config.drives.len()
    );

    init_process_memory(config.executor.reserve_memory_bytes)?;

    // ── Bus and drives ──
    let mut bus = SimulatedBus::new(config.drives.len())?;
    if let (Some(id), Some(after)) = (
        config.simulation.fault_drive,
        config.simulation.fault_after_cycles,
    ) {
        if let Some(index) = config.bus_position(id) {
            warn!("simulated fault planned on drive {id} after {after} cycles");
            bus = bus.with_fault(index, after);
        }
    }
    info!("Fieldbus '{}' with {} devices", bus.name(), bus.device_count());

    let mut runner = CycleRunner::with_layout(bus, &config.drive_layout())?;
    runner.set_auto_enable(args.enable);
    runner.set_budget_ns(period_ns);
    let runner = Arc::new(Mutex::new(runner));

    // ── Executor ──
    let mut executor =
        CyclicExecutor::with_attrs(config.shared.service_name.clone(), cpus, sched);
    bind(&runner, &executor)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    executor.start(period_ns)?;

    let deadline =
        (args.duration_s > 0).then(|| Instant::now() + Duration::from_secs(args.duration_s));
    let mut last_report = Instant::now();
    let outcome = loop {
        if !running.load(Ordering::SeqCst) {
            break Ok(());
        }
        if executor.deadline_missed() {
            break Err(CycleError::DeadlineMissed(executor.name().to_owned()));
        }
        if !executor.is_active() {
            warn!("executor ended unexpectedly");
            break Ok(());
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            info!("Run time of {}s elapsed", args.duration_s);
            break Ok(());
        }
        if last_report.elapsed() >= REPORT_INTERVAL {
            let snapshot = runner.lock().snapshot();
            report(&snapshot);
            last_report = Instant::now();
        }
        thread::sleep(MONITOR_POLL);
    };

    executor.stop();

    let snapshot = runner.lock().snapshot();
    report(&snapshot);
    let stats = &snapshot.stats;
    info!(
        cycles = stats.cycles,
        mean_ns = stats.mean_ns() as u64,
        min_ns = stats.min_ns,
        max_ns = stats.max_ns,
        stddev_ns = stats.stddev_ns() as u64,
        overruns = stats.overruns,
        errors = stats.errors,
        "cycle statistics"
    );

    outcome.map_err(Into::into)
}

/// Log one line per drive. Takes a snapshot so the RT loop never waits on
/// log output.
fn report(snapshot: &RunnerSnapshot) {
    for drive in &snapshot.drives {
        info!(
            drive = drive.id,
            state = %drive.state,
            position = drive.position,
            velocity = drive.velocity,
            torque = drive.torque,
            "drive status"
        );
    }
}

/// Setup tracing subscriber. `RUST_LOG` takes precedence over `directive`.
fn setup_tracing(directive: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
