//! Host resource spike monitor library
//!
//! This crate provides the core functionality for:
//! - Sampling host CPU, memory, disk and swap utilization
//! - Ranking the top resource-consuming processes
//! - Spike detection and the alert/recovery lifecycle
//! - Rendering and delivering operator notifications
//! - Health checks and observability

pub mod anomaly;
pub mod collector;
pub mod error;
pub mod health;
pub mod models;
pub mod notify;
pub mod observability;
pub mod spike_log;

pub use error::MonitorError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{MonitorMetrics, StructuredLogger};
