//! Append-only spike log
//!
//! Every spike poll appends a human-readable record to a plain text file,
//! independent of whether a notification was sent for it.

use crate::error::MonitorError;
use crate::models::{ProcessInfo, SpikeSnapshot};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Default location of the spike log
pub const DEFAULT_SPIKE_LOG_PATH: &str = "/var/log/monitoring_spike.log";

/// Line-oriented log file of spike polls
#[derive(Debug, Clone)]
pub struct SpikeLog {
    path: PathBuf,
}

impl SpikeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record for `snapshot`, creating the file if needed
    pub async fn record(&self, snapshot: &SpikeSnapshot) -> Result<(), MonitorError> {
        let entry = format_entry(snapshot);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

/// Render one spike record, terminated by a blank line
pub fn format_entry(snapshot: &SpikeSnapshot) -> String {
    let sample = &snapshot.sample;
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "Spike detected at {}", sample.timestamp.to_rfc3339());
    let _ = writeln!(out, "CPU Usage: {:.1}%", sample.max_cpu().unwrap_or_default());
    let _ = writeln!(out, "Memory Usage: {:.1}%", sample.memory_percent);
    let _ = writeln!(out, "Disk Usage: {:.1}%", sample.disk_percent);
    let _ = writeln!(out, "Swap Usage: {:.1}%", sample.swap_percent);

    let _ = writeln!(out, "Top CPU Processes:");
    for process in &snapshot.processes.top_by_cpu {
        write_process(&mut out, process, "CPU", process.cpu_percent);
    }
    let _ = writeln!(out, "Top Memory Processes:");
    for process in &snapshot.processes.top_by_memory {
        write_process(&mut out, process, "Memory", process.memory_percent);
    }
    out.push('\n');

    out
}

fn write_process(out: &mut String, process: &ProcessInfo, label: &str, value: f64) {
    let _ = writeln!(
        out,
        "PID: {}, Name: {}, User: {}, {}: {:.2}%",
        process.pid, process.name, process.user, label, value
    );
}
