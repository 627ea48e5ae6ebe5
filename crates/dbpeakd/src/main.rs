//! dbpeakd - database peak-latency observer.
//!
//! Polls the monitoring controller for every configured database, tracks the
//! highest observed average latency per statement, and emails an HTML + CSV
//! report when the configured duration elapses or on Ctrl-C.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use dbpeak_core::collector::ControllerClient;
use dbpeak_core::config::Config;
use dbpeak_core::driver::{DriverOptions, StopCause, run_poll_loop};
use dbpeak_core::store::PeakStore;
use dbpeak_core::{notify, report};

/// Database peak-latency observer daemon.
#[derive(Parser)]
#[command(name = "dbpeakd", about = "Database peak-latency observer", version)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Override run.duration_minutes from the config.
    #[arg(short, long)]
    duration: Option<u64>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("dbpeakd={}", level).parse().unwrap())
        .add_directive(format!("dbpeak_core={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    let mut config = match Config::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(minutes) = args.duration {
        config.run.duration_minutes = minutes;
    }

    info!("dbpeakd {} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "Config: controller={}, duration={}m, interval={}s, noise_floor={}ms",
        config.controller.base_url,
        config.run.duration_minutes,
        config.run.poll_interval_secs,
        config.run.min_duration_ms
    );
    info!(
        "Targets: {}",
        config
            .databases
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let client = match ControllerClient::new(&config.controller) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Graceful shutdown: Ctrl-C drops the flag, the loop finalizes normally
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received interrupt, finalizing report");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let mut store = PeakStore::new(&config.databases, config.run.min_duration_ms);
    let options = DriverOptions {
        duration: Duration::from_secs(config.run.duration_minutes * 60),
        poll_interval: Duration::from_secs(config.run.poll_interval_secs),
    };

    let started = Instant::now();
    let cause = match run_poll_loop(&client, &config.databases, &mut store, &options, &running) {
        Ok(cause) => cause,
        Err(e) => {
            // Only fatal auth failures escape the loop
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match cause {
        StopCause::TimerExpired => info!("Time limit reached, generating report"),
        StopCause::Interrupted => info!("Interrupted, generating report"),
    }

    let report = match report::finalize(&store, &config.databases, started.elapsed()) {
        Ok(r) => r,
        Err(e) => {
            error!("Report rendering failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Delivery failure is logged but does not fail the run: the report was
    // generated, the process is at end-of-life either way
    if let Err(e) = notify::send_report(&config.smtp, &config.email, &report) {
        error!("{}", e);
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}
