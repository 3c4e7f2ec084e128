//! Alert lifecycle for resource spikes
//!
//! Handles:
//! - Opening an incident on the first spike and alerting immediately
//! - Throttling repeat alerts while the incident stays open
//! - Emitting exactly one recovery when utilization returns to normal

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::SpikeSnapshot;

/// Default minimum gap between two alerts of the same incident (10 minutes)
pub const DEFAULT_RENOTIFY_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Coarse state of the alert lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    /// No open incident
    Normal,
    /// An incident is open
    Alerting,
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertState::Normal => write!(f, "normal"),
            AlertState::Alerting => write!(f, "alerting"),
        }
    }
}

/// The currently open spike
#[derive(Debug, Clone, PartialEq)]
pub struct Incident {
    /// Time of the spike that opened the incident
    pub opened_at: DateTime<Utc>,
    /// Time of the most recent alert emitted for this incident
    pub last_notified_at: DateTime<Utc>,
    /// Data captured when the incident opened; never refreshed
    pub snapshot: SpikeSnapshot,
}

/// Event emitted by a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    /// Utilization is above threshold and an alert is due
    Alert {
        /// Snapshot frozen at incident open
        incident: SpikeSnapshot,
        /// Snapshot of the poll that triggered this alert
        current: SpikeSnapshot,
        opened_at: DateTime<Utc>,
        first_in_incident: bool,
    },
    /// The open incident has cleared
    Recovery {
        /// Snapshot frozen at incident open
        incident: SpikeSnapshot,
        opened_at: DateTime<Utc>,
        recovered_at: DateTime<Utc>,
    },
}

impl AlertEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AlertEvent::Alert { .. } => "alert",
            AlertEvent::Recovery { .. } => "recovery",
        }
    }
}

/// Owns the incident record and decides which event, if any, a poll produces
#[derive(Debug)]
pub struct AlertStateMachine {
    renotify_interval: Duration,
    incident: Option<Incident>,
}

impl AlertStateMachine {
    /// Create a state machine with no open incident
    pub fn new(renotify_interval: Duration) -> Self {
        Self {
            renotify_interval,
            incident: None,
        }
    }

    pub fn renotify_interval(&self) -> Duration {
        self.renotify_interval
    }

    pub fn state(&self) -> AlertState {
        if self.incident.is_some() {
            AlertState::Alerting
        } else {
            AlertState::Normal
        }
    }

    /// The open incident, if any
    pub fn incident(&self) -> Option<&Incident> {
        self.incident.as_ref()
    }

    /// Feed one poll's verdict into the lifecycle.
    ///
    /// # Arguments
    /// * `spike` - Detector verdict for this poll
    /// * `now` - Capture time of the poll
    /// * `snapshot` - Sample and rankings of this poll
    ///
    /// # Returns
    /// * `Some(AlertEvent::Alert)` on the first spike of an incident or once
    ///   the re-notify interval has elapsed since the last alert
    /// * `Some(AlertEvent::Recovery)` on the first normal poll after a spike
    /// * `None` otherwise
    ///
    /// The transition is committed before the caller delivers the event, so a
    /// failed delivery still counts as notified.
    pub fn observe(
        &mut self,
        spike: bool,
        now: DateTime<Utc>,
        snapshot: SpikeSnapshot,
    ) -> Option<AlertEvent> {
        match (self.incident.take(), spike) {
            (None, false) => None,
            (None, true) => {
                self.incident = Some(Incident {
                    opened_at: now,
                    last_notified_at: now,
                    snapshot: snapshot.clone(),
                });
                Some(AlertEvent::Alert {
                    incident: snapshot.clone(),
                    current: snapshot,
                    opened_at: now,
                    first_in_incident: true,
                })
            }
            (Some(mut incident), true) => {
                let event = if renotify_due(incident.last_notified_at, now, self.renotify_interval)
                {
                    incident.last_notified_at = now;
                    Some(AlertEvent::Alert {
                        incident: incident.snapshot.clone(),
                        current: snapshot,
                        opened_at: incident.opened_at,
                        first_in_incident: false,
                    })
                } else {
                    None
                };
                self.incident = Some(incident);
                event
            }
            (Some(incident), false) => Some(AlertEvent::Recovery {
                incident: incident.snapshot,
                opened_at: incident.opened_at,
                recovered_at: now,
            }),
        }
    }
}

impl Default for AlertStateMachine {
    fn default() -> Self {
        Self::new(DEFAULT_RENOTIFY_INTERVAL)
    }
}

/// A clock that moved backwards never makes an alert due
fn renotify_due(last_notified_at: DateTime<Utc>, now: DateTime<Utc>, interval: Duration) -> bool {
    match (now - last_notified_at).to_std() {
        Ok(elapsed) => elapsed >= interval,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{process, sample_at, snapshot};

    fn spike_at(minute: i64) -> SpikeSnapshot {
        snapshot(
            sample_at(minute, &[99.0], 10.0, 10.0, 10.0),
            &[process(42, "stress", 99.0, 3.0)],
        )
    }

    fn normal_at(minute: i64) -> SpikeSnapshot {
        snapshot(sample_at(minute, &[20.0], 10.0, 10.0, 10.0), &[])
    }

    fn observe(machine: &mut AlertStateMachine, spike: bool, snap: SpikeSnapshot) -> Option<AlertEvent> {
        let now = snap.sample.timestamp;
        machine.observe(spike, now, snap)
    }

    #[test]
    fn test_first_spike_alerts_immediately() {
        let mut machine = AlertStateMachine::default();
        let snap = spike_at(0);

        let event = observe(&mut machine, true, snap.clone());

        match event {
            Some(AlertEvent::Alert {
                incident,
                current,
                first_in_incident,
                opened_at,
            }) => {
                assert!(first_in_incident);
                assert_eq!(incident, snap);
                assert_eq!(current, snap);
                assert_eq!(opened_at, snap.sample.timestamp);
            }
            other => panic!("expected first alert, got {:?}", other),
        }
        assert_eq!(machine.state(), AlertState::Alerting);
        let incident = machine.incident().unwrap();
        assert_eq!(incident.last_notified_at, incident.opened_at);
    }

    #[test]
    fn test_spikes_within_interval_are_throttled() {
        let mut machine = AlertStateMachine::new(Duration::from_secs(600));

        assert!(observe(&mut machine, true, spike_at(0)).is_some());
        for minute in 1..10 {
            assert!(observe(&mut machine, true, spike_at(minute)).is_none());
        }
        assert_eq!(machine.state(), AlertState::Alerting);
    }

    #[test]
    fn test_repeat_alert_after_interval() {
        let mut machine = AlertStateMachine::new(Duration::from_secs(600));

        assert!(observe(&mut machine, true, spike_at(0)).is_some());
        assert!(observe(&mut machine, true, spike_at(5)).is_none());

        let repeat = observe(&mut machine, true, spike_at(11));
        match repeat {
            Some(AlertEvent::Alert {
                first_in_incident,
                opened_at,
                current,
                incident,
            }) => {
                assert!(!first_in_incident);
                assert_eq!(opened_at, spike_at(0).sample.timestamp);
                assert_eq!(current.sample.timestamp, spike_at(11).sample.timestamp);
                assert_eq!(incident, spike_at(0));
            }
            other => panic!("expected repeat alert, got {:?}", other),
        }
    }

    #[test]
    fn test_throttle_clock_resets_on_notification_only() {
        let mut machine = AlertStateMachine::new(Duration::from_secs(600));

        observe(&mut machine, true, spike_at(0));
        // Repeat at exactly the interval boundary
        assert!(observe(&mut machine, true, spike_at(10)).is_some());
        // Measured from the repeat at minute 10, not from incident open
        assert!(observe(&mut machine, true, spike_at(15)).is_none());
        assert!(observe(&mut machine, true, spike_at(19)).is_none());
        assert!(observe(&mut machine, true, spike_at(20)).is_some());

        let incident = machine.incident().unwrap();
        assert_eq!(incident.opened_at, spike_at(0).sample.timestamp);
        assert_eq!(incident.last_notified_at, spike_at(20).sample.timestamp);
    }

    #[test]
    fn test_recovery_exactly_once() {
        let mut machine = AlertStateMachine::default();

        observe(&mut machine, true, spike_at(0));
        let recovery = observe(&mut machine, false, normal_at(5));
        assert!(matches!(recovery, Some(AlertEvent::Recovery { .. })));
        assert_eq!(machine.state(), AlertState::Normal);
        assert!(machine.incident().is_none());

        assert!(observe(&mut machine, false, normal_at(6)).is_none());
    }

    #[test]
    fn test_recovery_carries_frozen_snapshot() {
        let mut machine = AlertStateMachine::default();
        let opening = spike_at(0);

        observe(&mut machine, true, opening.clone());
        // A later spike with different processes must not replace the snapshot
        let later = snapshot(
            sample_at(3, &[100.0], 99.0, 10.0, 10.0),
            &[process(7, "java", 100.0, 99.0)],
        );
        observe(&mut machine, true, later);

        match observe(&mut machine, false, normal_at(5)) {
            Some(AlertEvent::Recovery {
                incident,
                opened_at,
                recovered_at,
            }) => {
                assert_eq!(incident, opening);
                assert_eq!(opened_at, opening.sample.timestamp);
                assert_eq!(recovered_at, normal_at(5).sample.timestamp);
            }
            other => panic!("expected recovery, got {:?}", other),
        }
    }

    #[test]
    fn test_never_alerting_never_recovers() {
        let mut machine = AlertStateMachine::default();

        for minute in 0..20 {
            assert!(observe(&mut machine, false, normal_at(minute)).is_none());
        }
        assert_eq!(machine.state(), AlertState::Normal);
    }

    #[test]
    fn test_new_incident_after_recovery() {
        let mut machine = AlertStateMachine::default();

        observe(&mut machine, true, spike_at(0));
        observe(&mut machine, false, normal_at(1));

        // Within the old throttle window, but a brand-new incident alerts at once
        match observe(&mut machine, true, spike_at(2)) {
            Some(AlertEvent::Alert {
                first_in_incident,
                opened_at,
                ..
            }) => {
                assert!(first_in_incident);
                assert_eq!(opened_at, spike_at(2).sample.timestamp);
            }
            other => panic!("expected a new first alert, got {:?}", other),
        }
    }

    #[test]
    fn test_mixed_scenario_event_sequence() {
        let mut machine = AlertStateMachine::new(Duration::from_secs(600));

        let events: Vec<Option<&'static str>> = vec![
            observe(&mut machine, false, normal_at(-1)),
            observe(&mut machine, true, spike_at(0)),
            observe(&mut machine, false, normal_at(5)),
        ]
        .iter()
        .map(|e| e.as_ref().map(AlertEvent::kind))
        .collect();

        assert_eq!(events, vec![None, Some("alert"), Some("recovery")]);
    }

    #[test]
    fn test_backwards_clock_does_not_renotify() {
        let mut machine = AlertStateMachine::new(Duration::from_secs(60));

        observe(&mut machine, true, spike_at(30));
        assert!(observe(&mut machine, true, spike_at(0)).is_none());
        assert_eq!(machine.state(), AlertState::Alerting);
    }
}
