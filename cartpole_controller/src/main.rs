//! # Cartpole Controller
//!
//! Hosted runtime of the controller core on the simulated rig.
//!
//! The step timer thread stands in for the timer interrupt, a TCP
//! connection stands in for the serial link. One host is served per run;
//! the process ends when the host disconnects or on Ctrl-C.

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use cartpole_common::config::LogLevel;
use cartpole_controller::axis::{Axes, lock_axes};
use cartpole_controller::config::ControllerConfig;
use cartpole_controller::controller::{Controller, Peripherals};
use cartpole_controller::error::ControllerError;
use cartpole_controller::hal::StepperDriver;
use cartpole_controller::sim::{SimAngles, SimClock, SimRail, TcpTransport};
use cartpole_controller::supervisor::{SafetyContext, StepTick, StepTimer};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Simulated rail length between the switches [steps].
const SIM_TRACK_LENGTH: i32 = 40_000;

/// Accept loop polling period.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Cartpole Controller: motion-safety core on a simulated rig
#[derive(Parser, Debug)]
#[command(name = "cartpole_controller")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Cartpole motion-safety core serving one host over TCP")]
struct Args {
    /// Path to the controller configuration TOML. Defaults apply if absent.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address the host connects to.
    #[arg(long, default_value = "127.0.0.1:7878")]
    listen: SocketAddr,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let config = load_config(&args);

    let log_level = config
        .as_ref()
        .map(|config| config.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);

    info!("Cartpole Controller v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = config
        .map_err(Into::into)
        .and_then(|config| run(&args, &config));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Cartpole Controller shutdown complete");
}

fn load_config(args: &Args) -> Result<ControllerConfig, ControllerError> {
    match args.config {
        Some(ref path) => Ok(ControllerConfig::load_validated(path)?),
        None => Ok(ControllerConfig::default()),
    }
}

fn run(args: &Args, config: &ControllerConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        service = %config.shared.service_name,
        carriages = config.controller.carriages.count(),
        "configuration loaded"
    );

    // ── Simulated rig ──
    let rail = SimRail::new(SIM_TRACK_LENGTH);
    let angles = SimAngles::new();
    let drivers = (1..=config.controller.carriages.count() as u8).map(|cart| rail.stepper(cart));
    let axes = Axes::from_config(config, drivers)?.into_shared();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    // ── Step timer ──
    let (safety, tick_handle) = SafetyContext::new();
    let mut step_tick = StepTick::new(Arc::clone(&axes), tick_handle);
    let timer = StepTimer::start(config.controller.step_period(), move || {
        step_tick.tick();
    })?;

    // ── Host link ──
    let listener = TcpListener::bind(args.listen)?;
    listener.set_nonblocking(true)?;
    info!(addr = %args.listen, "waiting for host");

    let session = match accept(&listener, &running)? {
        Some(stream) => {
            let transport = TcpTransport::new(stream)?;
            let peripherals = Peripherals {
                switches: Box::new(rail.limit_switches()),
                angles: Box::new(angles.sensor()),
                clock: Box::new(SimClock::wall()),
                transport: Box::new(transport),
            };
            let mut controller = Controller::new(config, Arc::clone(&axes), safety, peripherals);
            serve(&mut controller, &running)
        }
        None => Ok(()),
    };

    {
        let mut axes = lock_axes(&axes);
        axes.stop_all();
        axes.disable_all();
    }

    let stats = timer.stop();
    info!(
        ticks = stats.ticks,
        overruns = stats.overruns,
        max_tick_ns = stats.max_tick_ns,
        "step timer stopped"
    );

    session?;
    Ok(())
}

/// Wait for one host connection or a shutdown request.
fn accept(
    listener: &TcpListener,
    running: &AtomicBool,
) -> io::Result<Option<std::net::TcpStream>> {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                info!(%peer, "host connected");
                return Ok(Some(stream));
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// Run the main loop until shutdown or host disconnect.
fn serve<D: StepperDriver>(
    controller: &mut Controller<D>,
    running: &AtomicBool,
) -> Result<(), ControllerError> {
    controller.announce()?;

    while running.load(Ordering::SeqCst) {
        match controller.poll() {
            Ok(()) => thread::yield_now(),
            Err(ControllerError::Io(e)) if e.kind() == io::ErrorKind::ConnectionAborted => {
                info!("host disconnected");
                break;
            }
            Err(e) => {
                warn!(error = %e, "main loop stopped");
                return Err(e);
            }
        }
    }

    info!(packets = controller.packets_sent(), "session finished");
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, log_level: LogLevel) {
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        log_level
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    if args.json {
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
