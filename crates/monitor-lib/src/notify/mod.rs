//! Operator notifications
//!
//! Handles:
//! - Rendering alert and recovery events into HTML reports
//! - Delivering reports over SMTP
//! - A log-only fallback when no mail relay is configured

mod email;
mod report;

pub use email::{EmailConfig, EmailNotifier, DEFAULT_FROM_ADDRESS, DEFAULT_SMTP_PORT};
pub use report::{Notification, ReportRenderer};

use crate::anomaly::AlertEvent;
use crate::error::MonitorError;
use async_trait::async_trait;
use tracing::info;

/// Renders and delivers alert lifecycle events
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `event`.
    ///
    /// Failures are reported as `MonitorError::Delivery` and are never retried.
    async fn notify(&self, event: &AlertEvent) -> Result<(), MonitorError>;
}

/// Notifier that only writes the rendered subject to the log
pub struct LogNotifier {
    renderer: ReportRenderer,
}

impl LogNotifier {
    pub fn new(renderer: ReportRenderer) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &AlertEvent) -> Result<(), MonitorError> {
        let notification = self.renderer.render(event);
        info!(
            event_kind = event.kind(),
            subject = %notification.subject,
            body_bytes = notification.html_body.len(),
            "SMTP not configured, notification logged only"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::AlertStateMachine;
    use crate::models::fixtures::{process, sample_at, snapshot};

    #[tokio::test]
    async fn test_log_notifier_accepts_every_event() {
        let notifier = LogNotifier::new(ReportRenderer::new("web-01", 95.0));
        let mut alerts = AlertStateMachine::default();

        let spike = snapshot(
            sample_at(0, &[99.0], 10.0, 10.0, 10.0),
            &[process(42, "stress", 99.0, 1.0)],
        );
        let alert = alerts.observe(true, spike.sample.timestamp, spike).unwrap();
        assert!(notifier.notify(&alert).await.is_ok());

        let calm = snapshot(sample_at(15, &[5.0], 10.0, 10.0, 10.0), &[]);
        let recovery = alerts.observe(false, calm.sample.timestamp, calm).unwrap();
        assert!(notifier.notify(&recovery).await.is_ok());
    }
}
