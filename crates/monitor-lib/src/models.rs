//! Core data models for the spike monitor

use crate::error::MonitorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Default length of each process ranking
pub const DEFAULT_TOP_N: usize = 5;

/// Capacity of the sampled filesystem in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

impl DiskUsage {
    /// Human-readable summary, e.g. `Total: 49.09 GB, Used: 12.40 GB, Free: 36.69 GB`
    pub fn summary(&self) -> String {
        format!(
            "Total: {:.2} GB, Used: {:.2} GB, Free: {:.2} GB",
            self.total_bytes as f64 / BYTES_PER_GB,
            self.used_bytes as f64 / BYTES_PER_GB,
            self.free_bytes as f64 / BYTES_PER_GB
        )
    }
}

/// Host utilization captured by a single poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub timestamp: DateTime<Utc>,
    /// Per-core utilization; values above 100 are kept as reported
    pub cpu_per_core: Vec<f64>,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub swap_percent: f64,
    pub disk_usage: DiskUsage,
}

impl ResourceSample {
    /// Busiest core, `None` when no cores were reported
    pub fn max_cpu(&self) -> Option<f64> {
        self.cpu_per_core.iter().copied().reduce(f64::max)
    }

    /// Reject samples the detector cannot reason about
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.cpu_per_core.is_empty() {
            return Err(MonitorError::MalformedSample(
                "per-core CPU list is empty".to_string(),
            ));
        }

        if let Some((core, value)) = self
            .cpu_per_core
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(MonitorError::MalformedSample(format!(
                "core {} reported invalid utilization {}",
                core, value
            )));
        }

        for (name, value) in [
            ("memory", self.memory_percent),
            ("disk", self.disk_percent),
            ("swap", self.swap_percent),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(MonitorError::MalformedSample(format!(
                    "{} utilization {} is outside [0, 100]",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

/// A single process as seen by the ranker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub user: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Top consumers by CPU and by memory, highest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedProcesses {
    pub top_by_cpu: Vec<ProcessInfo>,
    pub top_by_memory: Vec<ProcessInfo>,
}

impl RankedProcesses {
    /// Rank `processes` by each metric, keeping at most `top_n` per list.
    ///
    /// The sort is stable, so ties keep the enumeration order of `processes`.
    pub fn rank(processes: &[ProcessInfo], top_n: usize) -> Self {
        Self {
            top_by_cpu: top_by(processes, top_n, |p| p.cpu_percent),
            top_by_memory: top_by(processes, top_n, |p| p.memory_percent),
        }
    }
}

fn top_by(
    processes: &[ProcessInfo],
    top_n: usize,
    metric: impl Fn(&ProcessInfo) -> f64,
) -> Vec<ProcessInfo> {
    let mut ranked = processes.to_vec();
    ranked.sort_by(|a, b| {
        metric(b)
            .partial_cmp(&metric(a))
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(top_n);
    ranked
}

/// Sample plus process rankings, as captured on one poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeSnapshot {
    pub sample: ResourceSample,
    pub processes: RankedProcesses,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    /// Sample at `minute` past a fixed epoch with the given utilization
    pub fn sample_at(minute: i64, cpu: &[f64], memory: f64, disk: f64, swap: f64) -> ResourceSample {
        ResourceSample {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + chrono::Duration::minutes(minute),
            cpu_per_core: cpu.to_vec(),
            memory_percent: memory,
            disk_percent: disk,
            swap_percent: swap,
            disk_usage: DiskUsage {
                total_bytes: 100 * 1024 * 1024 * 1024,
                used_bytes: (disk as u64) * 1024 * 1024 * 1024,
                free_bytes: (100 - disk as u64) * 1024 * 1024 * 1024,
            },
        }
    }

    pub fn process(pid: u32, name: &str, cpu: f64, memory: f64) -> ProcessInfo {
        ProcessInfo {
            pid,
            name: name.to_string(),
            user: "root".to_string(),
            cpu_percent: cpu,
            memory_percent: memory,
        }
    }

    pub fn snapshot(sample: ResourceSample, processes: &[ProcessInfo]) -> SpikeSnapshot {
        SpikeSnapshot {
            sample,
            processes: RankedProcesses::rank(processes, DEFAULT_TOP_N),
        }
    }
}
