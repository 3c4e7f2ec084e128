//! Spike detection and the alert lifecycle
//!
//! This module provides:
//! - Threshold-based spike verdicts for host samples
//! - The incident state machine that turns verdicts into alert and recovery events

mod alerter;
mod spike_detector;

pub use alerter::{
    AlertEvent, AlertState, AlertStateMachine, Incident, DEFAULT_RENOTIFY_INTERVAL,
};
pub use spike_detector::{Breaches, SpikeDetector, DEFAULT_THRESHOLD_PERCENT};
