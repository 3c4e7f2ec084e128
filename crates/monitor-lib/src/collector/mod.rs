//! Host metrics collection and the polling loop
//!
//! This module provides the collaborator traits consumed by the monitor
//! loop, a sysinfo-backed implementation of both, and the loop itself.

mod r#loop;
mod system;


pub use r#loop::{
    LoopConfig, MonitorLoop, MonitorLoopBuilder, DEFAULT_POLL_INTERVAL,
    UNHEALTHY_AFTER_SKIPPED_POLLS,
};
pub use system::{SysinfoCollector, DEFAULT_CPU_SAMPLE_WINDOW};

use crate::error::MonitorError;
use crate::models::{RankedProcesses, ResourceSample};

pub use async_trait::async_trait;

/// Produces host utilization snapshots
#[async_trait]
pub trait Sampler: Send + Sync {
    /// Capture a sample, blocking for the CPU averaging window.
    ///
    /// Collection failures surface as `MonitorError::SampleUnavailable`.
    async fn sample(&self) -> Result<ResourceSample, MonitorError>;
}

/// Produces the top-N process rankings
#[async_trait]
pub trait ProcessRanker: Send + Sync {
    /// Rank running processes by CPU and memory.
    ///
    /// Processes that exit mid-scan are omitted rather than reported as errors.
    async fn rank(&self, top_n: usize) -> Result<RankedProcesses, MonitorError>;
}
