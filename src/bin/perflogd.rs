//! perflogd - performance telemetry sampling daemon.
//!
//! Heals its two config files on startup, reconciles the settings store
//! against the metric catalogue, then samples and logs on a fixed interval
//! until a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use perflog::catalog::MetricKey;
use perflog::collector::RealFs;
use perflog::config::{ConfigReconciler, JsonSettingsStore, LogConfig};
use perflog::engine::{HostIdentity, SamplingEngine};
use perflog::scheduler::Scheduler;
use perflog::writer::{RotatingLogWriter, WriteError};

/// Performance telemetry sampling daemon.
#[derive(Parser)]
#[command(name = "perflogd", about = "Performance telemetry sampling daemon", version)]
struct Args {
    /// Path to the run configuration file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Path to the metric enable/disable settings file.
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

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
        .add_directive(format!("perflogd={}", level).parse().unwrap())
        .add_directive(format!("perflog={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn enabled_keys(view: Vec<(MetricKey, bool)>) -> Vec<MetricKey> {
    view.into_iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(key, _)| key)
        .collect()
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    info!("perflogd {} starting", env!("CARGO_PKG_VERSION"));

    let config = match LogConfig::load_or_create(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("cannot load run config {}: {e}", args.config.display());
            std::process::exit(1);
        }
    };
    info!(
        "Config: interval={}s, folder={}, file={}, max_records={}",
        config.interval_secs, config.folder_path, config.file_name, config.max_records
    );

    let mut reconciler = ConfigReconciler::new(JsonSettingsStore::new(&args.settings));
    match reconciler.reconcile() {
        Ok(0) => debug!("settings store complete"),
        Ok(created) => info!("settings store healed: {created} keys created"),
        Err(e) => error!("settings reconciliation incomplete: {e}"),
    }

    let enabled_system = enabled_keys(reconciler.system_metrics());
    let enabled_process = enabled_keys(reconciler.process_metrics());
    let process_names = config.process_names();
    info!(
        "Enabled: {} system metrics, {} process metrics; monitoring {:?}",
        enabled_system.len(),
        enabled_process.len(),
        process_names
    );

    let fs = RealFs::new();
    let identity = HostIdentity::detect(fs, "/proc");
    info!("Host identity: {} ({})", identity.node_name, identity.ip);

    let mut engine = SamplingEngine::new(
        fs,
        "/proc",
        identity,
        &enabled_system,
        &enabled_process,
        &process_names,
    );

    let mut writer = if config.write_to_log && !config.folder_path.is_empty() {
        let titles = engine.columns().into_iter().map(|c| c.title).collect();
        Some(RotatingLogWriter::new(
            &config.folder_path,
            &config.file_name,
            config.max_records,
            titles,
        ))
    } else {
        info!("File output disabled; sampling continues without it");
        None
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {e}");
    }

    let mut cycle_count: u64 = 0;
    let scheduler = Scheduler::new(config.interval(), running);

    info!("Starting sampling loop");
    scheduler.run(|| {
        cycle_count += 1;
        let sample = engine.sample();

        for (key, value) in &sample.fields {
            debug!("{key}={value}");
        }
        info!("Cycle #{}: {} fields sampled", cycle_count, sample.fields.len());

        if let Some(writer) = writer.as_mut() {
            writer.append(&sample.values())?;
        }
        Ok::<(), WriteError>(())
    });

    info!("Shutdown complete");
}
