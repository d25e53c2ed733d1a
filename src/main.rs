//! Guardian - Host Intrusion Monitoring Agent - Main Entry Point

mod logic;
pub mod constants;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use parking_lot::RwLock;
use tokio::sync::watch;

use constants::{APP_NAME, APP_VERSION, SENSOR_SHUTDOWN_GRACE, STATS_LOG_INTERVAL};
use logic::analysis_loop::{Pipeline, PipelineStats};
use logic::baseline::{AdaptiveBaseline, SysinfoSampler};
use logic::config::{Cli, GuardianConfig};
use logic::detection::{DetectionCascade, SignatureScanner};
use logic::forensic::{ForensicCollector, ObfuscationKey};
use logic::reporting::{ConsoleAlertReporter, HtmlReporter, JsonLinesReporter};
use logic::sensors::{self, SensorHandle};
use logic::telemetry::EventBus;

/// Exit status for configuration failures
const EXIT_CONFIG: u8 = 2;
/// Exit status for any other startup failure
const EXIT_STARTUP: u8 = 1;

fn main() -> ExitCode {
    let config = GuardianConfig::from_cli(Cli::parse());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level()))
        .init();

    log::info!("Starting {} v{}...", APP_NAME, APP_VERSION);

    if let Err(e) = config.validate() {
        log::error!("Configuration error: {}", e);
        return ExitCode::from(EXIT_CONFIG);
    }

    let scanner = match SignatureScanner::load(&config.rules_path) {
        Ok(scanner) => scanner,
        Err(e) => {
            log::error!("Configuration error: cannot load rules {}: {}", config.rules_path.display(), e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to create tokio runtime: {}", e);
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    let stats = match runtime.block_on(run(config, scanner)) {
        Ok(stats) => stats,
        Err(e) => {
            log::error!("Failed to start analysis loop: {}", e);
            runtime.shutdown_timeout(SENSOR_SHUTDOWN_GRACE);
            return ExitCode::from(EXIT_STARTUP);
        }
    };
    // Sensor polls still on the blocking pool are not waited for
    runtime.shutdown_timeout(SENSOR_SHUTDOWN_GRACE);

    log::info!(
        "{} stopped: {} events processed, {} idle cycles, {} cascades, failures forensic={} sinks={} cascade={} baseline={}",
        APP_NAME,
        stats.events_processed,
        stats.idle_cycles,
        stats.cascades_run,
        stats.forensic_failures,
        stats.sink_failures,
        stats.cascade_failures,
        stats.baseline_failures
    );
    ExitCode::SUCCESS
}

async fn run(config: GuardianConfig, scanner: SignatureScanner) -> std::io::Result<PipelineStats> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Stop signal received, shutting down...");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                log::error!("Cannot listen for Ctrl-C, running until killed: {}", e);
                // Dropping the sender would read as a stop request
                std::future::pending::<()>().await;
            }
        }
    });

    let key = ObfuscationKey::resolve(config.forensic_seed.as_deref());
    log::info!("Forensic key fingerprint {} ({:?})", key.fingerprint(), key.origin());
    let collector = ForensicCollector::new(&config.log_dir, key);

    let mut baseline = AdaptiveBaseline::load(&config.baseline_path, Box::new(SysinfoSampler::new()));
    if config.reset_baseline {
        if let Err(e) = baseline.reset() {
            log::error!("Baseline reset failed: {}", e);
        }
    }
    log::info!(
        "Baseline: {:.1} processes, {:.1} connections over {} samples",
        baseline.current().avg_processes,
        baseline.current().avg_connections,
        baseline.current().samples
    );

    let bus = EventBus::unbounded();
    let sensor_handles = sensors::spawn_all(&config, &bus, &shutdown_rx);
    log::info!("{} sensors running", sensor_handles.len());

    let pipeline = Pipeline::new(bus, collector, DetectionCascade::standard(scanner), baseline)
        .with_sink(Box::new(JsonLinesReporter::new(&config.log_dir)))
        .with_sink(Box::new(HtmlReporter::new(&config.log_dir)))
        .with_sink(Box::new(ConsoleAlertReporter::new(config.risk_medium, config.risk_high)))
        .with_medium_threshold(config.risk_medium)
        .with_poll_timeout(config.poll_interval);

    tokio::spawn(log_stats(pipeline.stats_handle(), shutdown_rx.clone()));

    let analysis = pipeline.spawn(shutdown_rx, tokio::runtime::Handle::current())?;
    let stats = match tokio::task::spawn_blocking(move || analysis.join()).await {
        Ok(Ok(stats)) => stats,
        _ => {
            log::error!("Analysis loop thread panicked");
            PipelineStats::default()
        }
    };

    stop_sensors(sensor_handles).await;
    Ok(stats)
}

/// Periodic progress line until the stop signal
async fn log_stats(stats: Arc<RwLock<PipelineStats>>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(STATS_LOG_INTERVAL);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let s = stats.read().clone();
                log::info!(
                    "[stats] processed={} idle={} cascades={} failures forensic={} sinks={}",
                    s.events_processed, s.idle_cycles, s.cascades_run, s.forensic_failures, s.sink_failures
                );
            }
        }
    }
}

/// Wait for sensors up to the grace period, then abort the rest
async fn stop_sensors(handles: Vec<SensorHandle>) {
    let deadline = tokio::time::Instant::now() + SENSOR_SHUTDOWN_GRACE;

    for SensorHandle { name, mut handle } in handles {
        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("[{}] sensor task ended abnormally: {}", name, e),
            Err(_) => {
                log::warn!("[{}] sensor did not stop within {:?}, aborting", name, SENSOR_SHUTDOWN_GRACE);
                handle.abort();
            }
        }
    }
}
