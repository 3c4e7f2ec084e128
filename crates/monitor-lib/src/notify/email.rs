//! Email notification delivery via SMTP.
//!
//! [`EmailNotifier`] renders events with [`ReportRenderer`] and sends them as
//! `text/html` messages through the `lettre` async SMTP transport. The
//! transport is built once; each notification opens its own connection.

use super::{Notifier, ReportRenderer};
use crate::anomaly::AlertEvent;
use crate::error::MonitorError;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

/// Default SMTP port (plain relay).
pub const DEFAULT_SMTP_PORT: u16 = 25;

/// Default sender address.
pub const DEFAULT_FROM_ADDRESS: &str = "monitor@localhost";

/// Configuration for the SMTP notifier.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP relay hostname.
    pub smtp_host: String,
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Every recipient receives the same message.
    pub recipients: Vec<String>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    /// Upgrade the connection with STARTTLS instead of speaking plain SMTP.
    pub starttls: bool,
}

impl From<lettre::transport::smtp::Error> for MonitorError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        MonitorError::Delivery(format!("SMTP transport error: {}", err))
    }
}

impl From<lettre::address::AddressError> for MonitorError {
    fn from(err: lettre::address::AddressError) -> Self {
        MonitorError::Delivery(format!("email address parse error: {}", err))
    }
}

/// Sends rendered notifications to the configured recipients.
pub struct EmailNotifier {
    renderer: ReportRenderer,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl EmailNotifier {
    /// Validate addresses and build the SMTP transport.
    pub fn new(config: EmailConfig, renderer: ReportRenderer) -> Result<Self, MonitorError> {
        if config.recipients.is_empty() {
            return Err(MonitorError::Delivery(
                "no email recipients configured".to_string(),
            ));
        }

        let from: Mailbox = config.from_address.parse()?;
        let recipients = config
            .recipients
            .iter()
            .map(|r| r.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };
        let mut builder = builder.port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            renderer,
            mailer: builder.build(),
            from,
            recipients,
        })
    }

    fn build_message(&self, event: &AlertEvent) -> Result<Message, MonitorError> {
        let notification = self.renderer.render(event);

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(notification.subject)
            .header(ContentType::TEXT_HTML);
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }

        builder
            .body(notification.html_body)
            .map_err(|e| MonitorError::Delivery(format!("email build error: {}", e)))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, event: &AlertEvent) -> Result<(), MonitorError> {
        let message = self.build_message(event)?;
        self.mailer.send(message).await?;

        info!(
            recipients = self.recipients.len(),
            event_kind = event.kind(),
            host = %self.renderer.hostname(),
            "Notification email sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{sample_at, snapshot};

    fn config() -> EmailConfig {
        EmailConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
            from_address: DEFAULT_FROM_ADDRESS.to_string(),
            recipients: vec!["ops@example.com".to_string(), "oncall@example.com".to_string()],
            smtp_user: None,
            smtp_password: None,
            starttls: false,
        }
    }

    #[tokio::test]
    async fn test_rejects_missing_recipients() {
        let mut cfg = config();
        cfg.recipients.clear();

        let result = EmailNotifier::new(cfg, ReportRenderer::new("web-1", 95.0));
        assert!(matches!(result, Err(MonitorError::Delivery(_))));
    }

    #[tokio::test]
    async fn test_rejects_invalid_address() {
        let mut cfg = config();
        cfg.recipients = vec!["not-an-email".to_string()];

        let err = EmailNotifier::new(cfg, ReportRenderer::new("web-1", 95.0))
            .err()
            .unwrap();
        assert!(err.to_string().contains("email address parse error"));
    }

    #[tokio::test]
    async fn test_builds_html_message_for_all_recipients() {
        let notifier = EmailNotifier::new(config(), ReportRenderer::new("web-1", 95.0)).unwrap();
        let snap = snapshot(sample_at(0, &[99.0], 10.0, 10.0, 10.0), &[]);
        let event = AlertEvent::Alert {
            incident: snap.clone(),
            current: snap.clone(),
            opened_at: snap.sample.timestamp,
            first_in_incident: true,
        };

        let message = notifier.build_message(&event).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: web-1 Server Resource Utilization Alert"));
        assert!(raw.contains("Content-Type: text/html"));
        assert!(raw.contains("ops@example.com"));
        assert!(raw.contains("oncall@example.com"));
    }
}
