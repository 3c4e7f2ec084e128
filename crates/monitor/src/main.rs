//! Spike Monitor - host resource spike alerting daemon
//!
//! Polls CPU, memory, disk and swap utilization, mails an alert when any
//! of them crosses the threshold and a recovery notice once the host is
//! back to normal.

use anyhow::{bail, Context, Result};
use monitor_lib::{
    collector::{MonitorLoopBuilder, SysinfoCollector},
    notify::{EmailNotifier, LogNotifier, Notifier, ReportRenderer},
    spike_log::SpikeLog,
    HealthRegistry, MonitorMetrics, StructuredLogger,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::MonitorConfig::load()?;
    info!(host = %config.hostname_label, "Monitor configured");

    let health_registry = HealthRegistry::with_monitor_components().await;
    let metrics = MonitorMetrics::new();

    let logger = StructuredLogger::new(&config.hostname_label);
    logger.log_startup(
        MONITOR_VERSION,
        config.threshold_percent,
        config.poll_interval_secs,
    );

    let collector = Arc::new(SysinfoCollector::new(
        &config.disk_mount_point,
        config.cpu_sample_window(),
    ));

    let renderer = ReportRenderer::new(&config.hostname_label, config.threshold_percent);
    let notifier: Arc<dyn Notifier> = match config.email_config() {
        Some(email) => {
            info!(
                smtp_host = %email.smtp_host,
                recipients = email.recipients.len(),
                "Delivering notifications over SMTP"
            );
            Arc::new(EmailNotifier::new(email, renderer).context("Invalid SMTP configuration")?)
        }
        None => {
            info!("SMTP not configured, notifications will only be logged");
            Arc::new(LogNotifier::new(renderer))
        }
    };

    let mut builder = MonitorLoopBuilder::new()
        .sampler(collector.clone())
        .ranker(collector)
        .notifier(notifier)
        .threshold(config.threshold_percent)
        .renotify_interval(config.renotify_interval())
        .poll_interval(config.poll_interval())
        .top_n(config.top_n)
        .health(health_registry.clone())
        .hostname(&config.hostname_label);
    if let Some(path) = config.spike_log_path() {
        builder = builder.spike_log(SpikeLog::new(path));
    }
    let monitor = builder.build()?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let monitor_handle = tokio::spawn(monitor.run(shutdown_rx));

    // Health and metrics server is opt-in
    if let Some(port) = config.api_port {
        let app_state = Arc::new(api::AppState::new(health_registry, metrics));
        tokio::spawn(async move {
            if let Err(e) = api::serve(port, app_state).await {
                error!(error = %e, "API server stopped");
            }
        });
    }

    supervise(monitor_handle, tokio::signal::ctrl_c(), shutdown_tx, &logger).await
}

/// Wait for SIGINT or for the monitor loop to end on its own.
///
/// The loop only returns after a shutdown broadcast, so ending first means it
/// panicked; that is reported as an error instead of leaving a daemon with
/// no poller.
async fn supervise<S>(
    mut monitor_handle: JoinHandle<()>,
    shutdown_signal: S,
    shutdown_tx: broadcast::Sender<()>,
    logger: &StructuredLogger,
) -> Result<()>
where
    S: Future<Output = std::io::Result<()>>,
{
    let signal = tokio::select! {
        signal = shutdown_signal => signal,
        result = &mut monitor_handle => {
            result.context("Monitor loop panicked")?;
            bail!("Monitor loop exited without a shutdown signal");
        }
    };
    signal.context("Failed to listen for SIGINT")?;
    logger.log_shutdown("SIGINT received");

    // The loop stops between polls; an in-flight poll finishes first
    let _ = shutdown_tx.send(());
    monitor_handle.await.context("Monitor loop panicked")?;

    Ok(())
}
