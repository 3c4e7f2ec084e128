//! Observability infrastructure for the spike monitor
//!
//! Provides:
//! - Prometheus metrics (poll outcomes, notifications, sample latency, incident state)
//! - Structured JSON logging with tracing

use crate::anomaly::{AlertEvent, Breaches};
use crate::error::MonitorError;
use crate::models::SpikeSnapshot;
use prometheus::{register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for sample latency (in seconds); sampling blocks for the CPU window
const SAMPLE_LATENCY_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 1.5, 2.0, 3.0, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct MonitorMetricsInner {
    sample_latency_seconds: Histogram,
    polls: IntCounter,
    polls_skipped: IntCounter,
    spikes_detected: IntCounter,
    alerts_sent: IntCounter,
    recoveries_sent: IntCounter,
    delivery_errors: IntCounter,
    incident_open: IntGauge,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            sample_latency_seconds: register_histogram!(
                "spike_monitor_sample_latency_seconds",
                "Time spent sampling host utilization",
                SAMPLE_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register sample_latency_seconds"),

            polls: register_int_counter!(
                "spike_monitor_polls_total",
                "Total number of poll cycles started"
            )
            .expect("Failed to register polls_total"),

            polls_skipped: register_int_counter!(
                "spike_monitor_polls_skipped_total",
                "Poll cycles skipped because of malformed or unavailable samples"
            )
            .expect("Failed to register polls_skipped_total"),

            spikes_detected: register_int_counter!(
                "spike_monitor_spikes_detected_total",
                "Poll cycles whose sample exceeded the threshold"
            )
            .expect("Failed to register spikes_detected_total"),

            alerts_sent: register_int_counter!(
                "spike_monitor_alerts_sent_total",
                "Alert notifications delivered"
            )
            .expect("Failed to register alerts_sent_total"),

            recoveries_sent: register_int_counter!(
                "spike_monitor_recoveries_sent_total",
                "Recovery notifications delivered"
            )
            .expect("Failed to register recoveries_sent_total"),

            delivery_errors: register_int_counter!(
                "spike_monitor_delivery_errors_total",
                "Notifications that could not be delivered"
            )
            .expect("Failed to register delivery_errors_total"),

            incident_open: register_int_gauge!(
                "spike_monitor_incident_open",
                "1 while a spike incident is open, 0 otherwise"
            )
            .expect("Failed to register incident_open"),
        }
    }
}

/// Monitor metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    pub fn observe_sample_latency(&self, duration_secs: f64) {
        self.inner().sample_latency_seconds.observe(duration_secs);
    }

    pub fn inc_polls(&self) {
        self.inner().polls.inc();
    }

    pub fn inc_polls_skipped(&self) {
        self.inner().polls_skipped.inc();
    }

    pub fn inc_spikes_detected(&self) {
        self.inner().spikes_detected.inc();
    }

    /// Count a delivered notification by event kind
    pub fn inc_notifications_sent(&self, event: &AlertEvent) {
        match event {
            AlertEvent::Alert { .. } => self.inner().alerts_sent.inc(),
            AlertEvent::Recovery { .. } => self.inner().recoveries_sent.inc(),
        }
    }

    pub fn inc_delivery_errors(&self) {
        self.inner().delivery_errors.inc();
    }

    pub fn set_incident_open(&self, open: bool) {
        self.inner().incident_open.set(i64::from(open));
    }
}

/// Structured logger for monitor events
///
/// Provides consistent JSON-formatted logging for spikes, incidents
/// and notification outcomes.
#[derive(Clone)]
pub struct StructuredLogger {
    hostname: String,
}

impl StructuredLogger {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }

    /// Log a poll whose sample exceeded the threshold
    pub fn log_spike(&self, snapshot: &SpikeSnapshot, breaches: &Breaches) {
        let sample = &snapshot.sample;
        let top_cpu = snapshot.processes.top_by_cpu.first();
        let top_memory = snapshot.processes.top_by_memory.first();

        warn!(
            event = "spike_detected",
            host = %self.hostname,
            breached = %breaches,
            max_cpu = sample.max_cpu().unwrap_or_default(),
            memory_percent = sample.memory_percent,
            disk_percent = sample.disk_percent,
            swap_percent = sample.swap_percent,
            top_cpu_process = ?top_cpu.map(|p| (p.pid, p.name.as_str())),
            top_memory_process = ?top_memory.map(|p| (p.pid, p.name.as_str())),
            "Resource spike detected"
        );
    }

    /// Log the state transition behind an emitted event
    pub fn log_transition(&self, event: &AlertEvent) {
        match event {
            AlertEvent::Alert {
                opened_at,
                first_in_incident: true,
                ..
            } => {
                warn!(
                    event = "incident_opened",
                    host = %self.hostname,
                    opened_at = %opened_at.to_rfc3339(),
                    "Spike incident opened"
                );
            }
            AlertEvent::Alert { opened_at, .. } => {
                info!(
                    event = "incident_renotified",
                    host = %self.hostname,
                    opened_at = %opened_at.to_rfc3339(),
                    "Spike incident still open, re-notifying"
                );
            }
            AlertEvent::Recovery {
                opened_at,
                recovered_at,
                ..
            } => {
                info!(
                    event = "incident_recovered",
                    host = %self.hostname,
                    opened_at = %opened_at.to_rfc3339(),
                    recovered_at = %recovered_at.to_rfc3339(),
                    duration_secs = (*recovered_at - *opened_at).num_seconds(),
                    "Resource utilization back to normal"
                );
            }
        }
    }

    /// Log a poll cycle that was abandoned before detection
    pub fn log_poll_skipped(&self, err: &MonitorError) {
        warn!(
            event = "poll_skipped",
            host = %self.hostname,
            error_kind = err.kind(),
            error = %err,
            "Skipping poll cycle"
        );
    }

    /// Log notification delivery outcome
    pub fn log_notification(&self, event: &AlertEvent, result: &Result<(), MonitorError>) {
        match result {
            Ok(()) => {
                info!(
                    event = "notification_sent",
                    host = %self.hostname,
                    event_kind = event.kind(),
                    "Notification delivered"
                );
            }
            Err(e) => {
                error!(
                    event = "notification_failed",
                    host = %self.hostname,
                    event_kind = event.kind(),
                    error = %e,
                    "Notification delivery failed, not retrying"
                );
            }
        }
    }

    /// Log a failed append to the spike log file
    pub fn log_spike_log_failure(&self, err: &MonitorError) {
        warn!(
            event = "spike_log_failed",
            host = %self.hostname,
            error = %err,
            "Failed to append to spike log"
        );
    }

    /// Log monitor startup
    pub fn log_startup(&self, version: &str, threshold: f64, poll_interval_secs: u64) {
        info!(
            event = "monitor_started",
            host = %self.hostname,
            version = %version,
            threshold_percent = threshold,
            poll_interval_secs = poll_interval_secs,
            "Spike monitor started"
        );
    }

    /// Log monitor shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_shutdown",
            host = %self.hostname,
            reason = %reason,
            "Spike monitor shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_metrics_creation() {
        // Metrics live in the process-global Prometheus registry; creating
        // several handles must reuse the single registration.
        let metrics = MonitorMetrics::new();
        let again = MonitorMetrics::new();

        metrics.observe_sample_latency(1.02);
        metrics.inc_polls();
        metrics.inc_polls_skipped();
        again.inc_spikes_detected();
        again.inc_delivery_errors();
        again.set_incident_open(true);
        again.set_incident_open(false);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-host");
        assert_eq!(logger.hostname, "test-host");
    }
}
