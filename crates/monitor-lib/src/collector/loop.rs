//! Spike monitor polling loop
//!
//! Drives the strictly sequential cycle: sample, detect, rank, log,
//! transition, notify, then wait for the next tick.

use super::{ProcessRanker, Sampler};
use crate::anomaly::{AlertEvent, AlertState, AlertStateMachine, SpikeDetector};
use crate::error::MonitorError;
use crate::health::{components, HealthRegistry};
use crate::models::{RankedProcesses, SpikeSnapshot, DEFAULT_TOP_N};
use crate::notify::Notifier;
use crate::observability::{MonitorMetrics, StructuredLogger};
use crate::spike_log::SpikeLog;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Default poll period (15 minutes)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Consecutive skipped polls after which the sampler is reported unhealthy
pub const UNHEALTHY_AFTER_SKIPPED_POLLS: u32 = 3;

/// Configuration for the polling loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Time between poll starts (default: 15 minutes)
    pub poll_interval: Duration,
    /// Length of each process ranking (default: 5)
    pub top_n: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            top_n: DEFAULT_TOP_N,
        }
    }
}

/// Polling loop owning the alert state machine
pub struct MonitorLoop {
    sampler: Arc<dyn Sampler>,
    ranker: Arc<dyn ProcessRanker>,
    notifier: Arc<dyn Notifier>,
    spike_log: Option<SpikeLog>,
    detector: SpikeDetector,
    alerts: AlertStateMachine,
    config: LoopConfig,
    health: HealthRegistry,
    metrics: MonitorMetrics,
    logger: StructuredLogger,
    skipped_polls: u32,
}

impl MonitorLoop {
    /// Run until a shutdown signal arrives. The first poll happens immediately.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.poll_interval.as_secs(),
            threshold = self.detector.threshold,
            renotify_secs = self.alerts.renotify_interval().as_secs(),
            "Starting spike monitor loop"
        );

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = shutdown.recv() => {
                    info!("Shutting down spike monitor loop");
                    break;
                }
            }
        }
    }

    /// Run one scheduled poll, absorbing skip-cycle errors.
    ///
    /// The sampler is degraded on a skipped poll and unhealthy once
    /// `UNHEALTHY_AFTER_SKIPPED_POLLS` polls in a row were skipped.
    pub async fn tick(&mut self) {
        self.metrics.inc_polls();
        match self.poll_once().await {
            Ok(_) => self.skipped_polls = 0,
            Err(e) => {
                self.skipped_polls = self.skipped_polls.saturating_add(1);
                self.metrics.inc_polls_skipped();
                self.logger.log_poll_skipped(&e);

                let message = format!("{} ({} consecutive skipped polls)", e, self.skipped_polls);
                if self.skipped_polls >= UNHEALTHY_AFTER_SKIPPED_POLLS {
                    self.health.set_unhealthy(components::SAMPLER, message).await;
                } else {
                    self.health.set_degraded(components::SAMPLER, message).await;
                }
            }
        }
    }

    /// Run a single poll cycle.
    ///
    /// # Returns
    /// * `Ok(Some(event))` when the poll produced an alert or recovery; the
    ///   event has already been handed to the notifier
    /// * `Ok(None)` when no notification was due
    /// * `Err(_)` for a malformed or unavailable sample; no state transition
    ///   happened
    pub async fn poll_once(&mut self) -> Result<Option<AlertEvent>, MonitorError> {
        let started = Instant::now();
        let sample = self.sampler.sample().await?;
        self.metrics
            .observe_sample_latency(started.elapsed().as_secs_f64());

        let breaches = self.detector.breaches(&sample)?;
        let spike = breaches.any();

        // Rankings only matter for alerts; normal polls skip the process scan
        let processes = if spike {
            self.ranker.rank(self.config.top_n).await?
        } else {
            RankedProcesses::default()
        };

        self.health.set_healthy(components::SAMPLER).await;

        let now = sample.timestamp;
        let snapshot = SpikeSnapshot { sample, processes };

        if spike {
            self.metrics.inc_spikes_detected();
            self.logger.log_spike(&snapshot, &breaches);
            self.append_spike_log(&snapshot).await;
        } else {
            debug!(
                max_cpu = snapshot.sample.max_cpu().unwrap_or_default(),
                memory_percent = snapshot.sample.memory_percent,
                disk_percent = snapshot.sample.disk_percent,
                swap_percent = snapshot.sample.swap_percent,
                "Utilization within threshold"
            );
        }

        let event = self.alerts.observe(spike, now, snapshot);
        let incident_open = self.alerts.state() == AlertState::Alerting;
        self.metrics.set_incident_open(incident_open);
        self.health.record_poll(now, incident_open).await;

        if let Some(event) = &event {
            self.logger.log_transition(event);
            self.dispatch(event).await;
        }

        Ok(event)
    }

    pub fn state(&self) -> AlertState {
        self.alerts.state()
    }

    /// The transition is already committed; failures are logged, not retried
    async fn dispatch(&self, event: &AlertEvent) {
        let result = self.notifier.notify(event).await;
        self.logger.log_notification(event, &result);

        match result {
            Ok(()) => {
                self.metrics.inc_notifications_sent(event);
                self.health.set_healthy(components::NOTIFIER).await;
            }
            Err(e) => {
                self.metrics.inc_delivery_errors();
                self.health
                    .set_degraded(components::NOTIFIER, e.to_string())
                    .await;
            }
        }
    }

    async fn append_spike_log(&self, snapshot: &SpikeSnapshot) {
        let Some(spike_log) = &self.spike_log else {
            return;
        };

        match spike_log.record(snapshot).await {
            Ok(()) => self.health.set_healthy(components::SPIKE_LOG).await,
            Err(e) => {
                self.logger.log_spike_log_failure(&e);
                self.health
                    .set_degraded(components::SPIKE_LOG, e.to_string())
                    .await;
            }
        }
    }
}

/// Builder for creating the polling loop
pub struct MonitorLoopBuilder {
    sampler: Option<Arc<dyn Sampler>>,
    ranker: Option<Arc<dyn ProcessRanker>>,
    notifier: Option<Arc<dyn Notifier>>,
    spike_log: Option<SpikeLog>,
    detector: SpikeDetector,
    renotify_interval: Duration,
    config: LoopConfig,
    health: Option<HealthRegistry>,
    hostname: String,
}

impl MonitorLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            sampler: None,
            ranker: None,
            notifier: None,
            spike_log: None,
            detector: SpikeDetector::default(),
            renotify_interval: crate::anomaly::DEFAULT_RENOTIFY_INTERVAL,
            config: LoopConfig::default(),
            health: None,
            hostname: "unknown".to_string(),
        }
    }

    pub fn sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn ranker(mut self, ranker: Arc<dyn ProcessRanker>) -> Self {
        self.ranker = Some(ranker);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Append every spike poll to this log file
    pub fn spike_log(mut self, spike_log: SpikeLog) -> Self {
        self.spike_log = Some(spike_log);
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.detector = SpikeDetector::new(threshold);
        self
    }

    pub fn renotify_interval(mut self, interval: Duration) -> Self {
        self.renotify_interval = interval;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn top_n(mut self, top_n: usize) -> Self {
        self.config.top_n = top_n;
        self
    }

    /// Share a health registry with the HTTP endpoint
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Build the polling loop
    pub fn build(self) -> Result<MonitorLoop> {
        let sampler = self
            .sampler
            .ok_or_else(|| anyhow::anyhow!("Sampler is required"))?;
        let ranker = self
            .ranker
            .ok_or_else(|| anyhow::anyhow!("Process ranker is required"))?;
        let notifier = self
            .notifier
            .ok_or_else(|| anyhow::anyhow!("Notifier is required"))?;
        if self.config.poll_interval.is_zero() {
            anyhow::bail!("Poll interval must be greater than zero");
        }

        Ok(MonitorLoop {
            sampler,
            ranker,
            notifier,
            spike_log: self.spike_log,
            detector: self.detector,
            alerts: AlertStateMachine::new(self.renotify_interval),
            config: self.config,
            health: self.health.unwrap_or_default(),
            metrics: MonitorMetrics::new(),
            logger: StructuredLogger::new(self.hostname),
            skipped_polls: 0,
        })
    }
}

impl Default for MonitorLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
