//! Error taxonomy for the monitor
//!
//! Every variant is absorbed by the polling loop; none of them is fatal.

/// Errors produced while polling, detecting and notifying
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The sample is structurally invalid (no CPU cores, NaN or out of range percentages)
    #[error("malformed sample: {0}")]
    MalformedSample(String),

    /// A collaborator could not produce a sample or process ranking
    #[error("sample unavailable: {0}")]
    SampleUnavailable(String),

    /// A notification could not be rendered or delivered
    #[error("notification delivery failed: {0}")]
    Delivery(String),

    /// The append-only spike log could not be written
    #[error("spike log write failed: {0}")]
    SpikeLog(#[from] std::io::Error),
}

impl MonitorError {
    /// Whether the error aborts the current poll cycle before any state transition
    pub fn skips_cycle(&self) -> bool {
        matches!(
            self,
            MonitorError::MalformedSample(_) | MonitorError::SampleUnavailable(_)
        )
    }

    /// Short machine-readable name used in structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorError::MalformedSample(_) => "malformed_sample",
            MonitorError::SampleUnavailable(_) => "sample_unavailable",
            MonitorError::Delivery(_) => "delivery",
            MonitorError::SpikeLog(_) => "spike_log",
        }
    }
}
