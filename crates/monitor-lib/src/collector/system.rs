//! Host collector backed by sysinfo
//!
//! Reads per-core CPU, memory, swap and filesystem usage, and enumerates
//! processes for the top-N rankings.

use super::{async_trait, ProcessRanker, Sampler};
use crate::error::MonitorError;
use crate::models::{DiskUsage, ProcessInfo, RankedProcesses, ResourceSample};
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::{Disks, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind, Users};
use tokio::sync::Mutex;
use tracing::debug;

/// Default CPU averaging window (1 second)
pub const DEFAULT_CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

const UNKNOWN_USER: &str = "unknown";

/// Samples the local host through sysinfo
pub struct SysinfoCollector {
    system: Mutex<System>,
    mount_point: PathBuf,
    cpu_window: Duration,
}

impl SysinfoCollector {
    /// Create a collector sampling the filesystem mounted at `mount_point`
    pub fn new(mount_point: impl Into<PathBuf>, cpu_window: Duration) -> Self {
        Self {
            system: Mutex::new(System::new()),
            mount_point: mount_point.into(),
            // sysinfo needs two refreshes at least this far apart
            cpu_window: cpu_window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    pub fn cpu_window(&self) -> Duration {
        self.cpu_window
    }

    fn disk_usage(&self) -> Result<DiskUsage, MonitorError> {
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == self.mount_point.as_path())
            .ok_or_else(|| {
                MonitorError::SampleUnavailable(format!(
                    "no filesystem mounted at {}",
                    self.mount_point.display()
                ))
            })?;

        let total_bytes = disk.total_space();
        let free_bytes = disk.available_space();
        Ok(DiskUsage {
            total_bytes,
            used_bytes: total_bytes.saturating_sub(free_bytes),
            free_bytes,
        })
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}

#[async_trait]
impl Sampler for SysinfoCollector {
    async fn sample(&self) -> Result<ResourceSample, MonitorError> {
        let mut system = self.system.lock().await;

        system.refresh_cpu_usage();
        tokio::time::sleep(self.cpu_window).await;
        system.refresh_cpu_usage();
        system.refresh_memory();

        let cpu_per_core: Vec<f64> = system
            .cpus()
            .iter()
            .map(|cpu| f64::from(cpu.cpu_usage()))
            .collect();
        if cpu_per_core.is_empty() {
            return Err(MonitorError::SampleUnavailable(
                "no CPU cores reported".to_string(),
            ));
        }

        let total_memory = system.total_memory();
        if total_memory == 0 {
            return Err(MonitorError::SampleUnavailable(
                "total memory reported as zero".to_string(),
            ));
        }

        let disk_usage = self.disk_usage()?;

        Ok(ResourceSample {
            timestamp: chrono::Utc::now(),
            cpu_per_core,
            memory_percent: percent(system.used_memory(), total_memory),
            disk_percent: percent(disk_usage.used_bytes, disk_usage.total_bytes),
            swap_percent: percent(system.used_swap(), system.total_swap()),
            disk_usage,
        })
    }
}

#[async_trait]
impl ProcessRanker for SysinfoCollector {
    async fn rank(&self, top_n: usize) -> Result<RankedProcesses, MonitorError> {
        let mut system = self.system.lock().await;
        let refresh = ProcessRefreshKind::nothing()
            .with_cpu()
            .with_memory()
            .with_user(UpdateKind::OnlyIfNotSet);

        // Process CPU usage is measured between two refreshes
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh);
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh);
        system.refresh_memory();

        let total_memory = system.total_memory();
        let users = Users::new_with_refreshed_list();

        let mut processes: Vec<ProcessInfo> = system
            .processes()
            .iter()
            // Linux lists every thread as a task sharing its parent's memory
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, process)| ProcessInfo {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                user: process
                    .user_id()
                    .and_then(|uid| users.get_user_by_id(uid))
                    .map(|user| user.name().to_string())
                    .unwrap_or_else(|| UNKNOWN_USER.to_string()),
                cpu_percent: f64::from(process.cpu_usage()),
                memory_percent: percent(process.memory(), total_memory),
            })
            .collect();

        // Enumerate in pid order so ties rank deterministically
        processes.sort_by_key(|p| p.pid);

        debug!(processes = processes.len(), top_n = top_n, "Ranked processes");

        Ok(RankedProcesses::rank(&processes, top_n))
    }
}
