//! Resource spike detection
//!
//! A poll is a spike when the busiest CPU core, memory, disk or swap
//! utilization is strictly above a single configurable threshold.

use std::fmt;

use crate::error::MonitorError;
use crate::models::ResourceSample;

/// Default spike threshold in percent
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 95.0;

/// Detects samples exceeding the utilization threshold
#[derive(Debug, Clone, Copy)]
pub struct SpikeDetector {
    /// Spike boundary applied to all four metrics
    pub threshold: f64,
}

impl SpikeDetector {
    /// Create a new spike detector with given threshold
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Whether `sample` is a spike.
    ///
    /// # Errors
    /// * `MonitorError::MalformedSample` if the sample fails validation,
    ///   most notably when no per-core CPU values are present
    pub fn is_spike(&self, sample: &ResourceSample) -> Result<bool, MonitorError> {
        Ok(self.breaches(sample)?.any())
    }

    /// Which metrics of `sample` exceed the threshold
    pub fn breaches(&self, sample: &ResourceSample) -> Result<Breaches, MonitorError> {
        sample.validate()?;

        let max_cpu = sample.max_cpu().ok_or_else(|| {
            MonitorError::MalformedSample("per-core CPU list is empty".to_string())
        })?;

        Ok(Breaches {
            cpu: max_cpu > self.threshold,
            memory: sample.memory_percent > self.threshold,
            disk: sample.disk_percent > self.threshold,
            swap: sample.swap_percent > self.threshold,
        })
    }
}

impl Default for SpikeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_PERCENT)
    }
}

/// Per-metric threshold verdicts for one sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Breaches {
    pub cpu: bool,
    pub memory: bool,
    pub disk: bool,
    pub swap: bool,
}

impl Breaches {
    pub fn any(&self) -> bool {
        self.cpu || self.memory || self.disk || self.swap
    }
}

impl fmt::Display for Breaches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (self.cpu, "cpu"),
            (self.memory, "memory"),
            (self.disk, "disk"),
            (self.swap, "swap"),
        ]
        .into_iter()
        .filter_map(|(hit, name)| hit.then_some(name))
        .collect();

        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::sample_at;

    #[test]
    fn test_no_spike_normal_usage() {
        let detector = SpikeDetector::default();
        let sample = sample_at(0, &[50.0, 20.0], 10.0, 10.0, 10.0);

        assert!(!detector.is_spike(&sample).unwrap());
    }

    #[test]
    fn test_each_metric_triggers_spike() {
        let detector = SpikeDetector::default();

        let cpu = sample_at(0, &[10.0, 99.0], 10.0, 10.0, 10.0);
        let memory = sample_at(0, &[10.0], 96.0, 10.0, 10.0);
        let disk = sample_at(0, &[10.0], 10.0, 97.0, 10.0);
        let swap = sample_at(0, &[10.0], 10.0, 10.0, 95.5);

        assert!(detector.breaches(&cpu).unwrap().cpu);
        assert!(detector.breaches(&memory).unwrap().memory);
        assert!(detector.breaches(&disk).unwrap().disk);
        assert!(detector.breaches(&swap).unwrap().swap);

        for sample in [cpu, memory, disk, swap] {
            assert!(detector.is_spike(&sample).unwrap());
        }
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let detector = SpikeDetector::default();
        let at_threshold = sample_at(0, &[95.0], 95.0, 95.0, 95.0);

        assert!(!detector.is_spike(&at_threshold).unwrap());
        assert_eq!(detector.breaches(&at_threshold).unwrap(), Breaches::default());
    }

    #[test]
    fn test_custom_threshold() {
        let detector = SpikeDetector::new(80.0);
        let sample = sample_at(0, &[81.0], 10.0, 10.0, 10.0);

        assert!(detector.is_spike(&sample).unwrap());
        assert!(!SpikeDetector::default().is_spike(&sample).unwrap());
    }

    #[test]
    fn test_cpu_above_hundred_is_preserved() {
        let detector = SpikeDetector::default();
        let sample = sample_at(0, &[112.0], 10.0, 10.0, 10.0);

        assert!(detector.is_spike(&sample).unwrap());
    }

    #[test]
    fn test_empty_cpu_list_is_malformed() {
        let detector = SpikeDetector::default();
        let sample = sample_at(0, &[], 99.0, 10.0, 10.0);

        let result = detector.is_spike(&sample);
        assert!(matches!(result, Err(MonitorError::MalformedSample(_))));
    }

    #[test]
    fn test_breaches_display() {
        let breaches = Breaches {
            cpu: true,
            swap: true,
            ..Default::default()
        };
        assert_eq!(breaches.to_string(), "cpu,swap");
        assert_eq!(Breaches::default().to_string(), "none");
    }
}
