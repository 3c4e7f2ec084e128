//! Monitor configuration

use anyhow::{bail, Context, Result};
use monitor_lib::notify::{EmailConfig, DEFAULT_FROM_ADDRESS, DEFAULT_SMTP_PORT};
use serde::Deserialize;
use std::time::Duration;

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "MONITOR_CONFIG_FILE";

/// Monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Spike boundary, in percent, for every metric
    #[serde(default = "default_threshold_percent")]
    pub threshold_percent: f64,

    /// Minimum gap between two alerts of the same incident
    #[serde(default = "default_renotify_interval")]
    pub renotify_interval_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Length of each process ranking
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Host name used in subjects and logs
    #[serde(default = "default_hostname_label")]
    pub hostname_label: String,

    #[serde(default = "default_cpu_sample_window")]
    pub cpu_sample_window_ms: u64,

    #[serde(default = "default_disk_mount_point")]
    pub disk_mount_point: String,

    /// Spike log file; empty disables it
    #[serde(default = "default_spike_log_path")]
    pub spike_log_path: String,

    /// SMTP relay host; unset logs notifications instead of mailing them
    #[serde(default)]
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default = "default_smtp_from")]
    pub smtp_from: String,

    /// Comma separated recipient list
    #[serde(default)]
    pub smtp_to: Option<String>,

    #[serde(default)]
    pub smtp_user: Option<String>,

    #[serde(default)]
    pub smtp_password: Option<String>,

    #[serde(default)]
    pub smtp_starttls: bool,

    /// API server port for health/metrics; unset disables the server
    #[serde(default)]
    pub api_port: Option<u16>,
}

fn default_threshold_percent() -> f64 {
    monitor_lib::anomaly::DEFAULT_THRESHOLD_PERCENT
}

fn default_renotify_interval() -> u64 {
    monitor_lib::anomaly::DEFAULT_RENOTIFY_INTERVAL.as_secs()
}

fn default_poll_interval() -> u64 {
    monitor_lib::collector::DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_top_n() -> usize {
    monitor_lib::DEFAULT_TOP_N
}

fn default_hostname_label() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string())
}

fn default_cpu_sample_window() -> u64 {
    monitor_lib::collector::DEFAULT_CPU_SAMPLE_WINDOW.as_millis() as u64
}

fn default_disk_mount_point() -> String {
    "/".to_string()
}

fn default_spike_log_path() -> String {
    monitor_lib::spike_log::DEFAULT_SPIKE_LOG_PATH.to_string()
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_smtp_from() -> String {
    DEFAULT_FROM_ADDRESS.to_string()
}

impl MonitorConfig {
    /// Load configuration from the optional config file and `MONITOR_*` environment
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path));
        }
        let config = builder
            .add_source(config::Environment::with_prefix("MONITOR").try_parsing(true))
            .build()
            .context("Failed to read monitor configuration")?;

        Self::from_config(config)
    }

    /// Deserialize and validate an already assembled configuration
    pub fn from_config(config: config::Config) -> Result<Self> {
        let parsed: MonitorConfig = config
            .try_deserialize()
            .context("Invalid monitor configuration")?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.threshold_percent > 0.0 && self.threshold_percent <= 100.0) {
            bail!(
                "threshold_percent must be in (0, 100], got {}",
                self.threshold_percent
            );
        }
        if self.top_n == 0 {
            bail!("top_n must be greater than zero");
        }
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be greater than zero");
        }
        if self.smtp_host.is_some() && self.recipients().is_empty() {
            bail!("smtp_to must list at least one recipient when smtp_host is set");
        }
        Ok(())
    }

    pub fn renotify_interval(&self) -> Duration {
        Duration::from_secs(self.renotify_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn cpu_sample_window(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_window_ms)
    }

    /// Spike log location, `None` when the file sink is disabled
    pub fn spike_log_path(&self) -> Option<&str> {
        let path = self.spike_log_path.trim();
        (!path.is_empty()).then_some(path)
    }

    fn recipients(&self) -> Vec<String> {
        self.smtp_to
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// SMTP settings, `None` when no relay is configured
    pub fn email_config(&self) -> Option<EmailConfig> {
        let smtp_host = self.smtp_host.clone()?;
        Some(EmailConfig {
            smtp_host,
            smtp_port: self.smtp_port,
            from_address: self.smtp_from.clone(),
            recipients: self.recipients(),
            smtp_user: self.smtp_user.clone(),
            smtp_password: self.smtp_password.clone(),
            starttls: self.smtp_starttls,
        })
    }
}
