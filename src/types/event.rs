//! Event envelope and topic enumeration for the event bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed enumeration of event topics.
///
/// Wire names are dotted strings (`trainset.status_changed`); the enum keeps
/// topic matching exhaustive inside the process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventKind {
    #[serde(rename = "trainset.updated")]
    TrainsetUpdated,
    #[serde(rename = "trainset.status_changed")]
    TrainsetStatusChanged,
    #[serde(rename = "fitness.updated")]
    FitnessUpdated,
    #[serde(rename = "jobcard.updated")]
    JobCardUpdated,
    #[serde(rename = "schedule.updated")]
    ScheduleUpdated,
    #[serde(rename = "decision.generated")]
    DecisionGenerated,
    #[serde(rename = "optimization.started")]
    OptimizationStarted,
    #[serde(rename = "optimization.progress")]
    OptimizationProgress,
    #[serde(rename = "optimization.iteration")]
    OptimizationIteration,
    #[serde(rename = "optimization.completed")]
    OptimizationCompleted,
    #[serde(rename = "optimization.failed")]
    OptimizationFailed,
    #[serde(rename = "optimization.cancelled")]
    OptimizationCancelled,
    #[serde(rename = "maintenance.alert")]
    MaintenanceAlert,
    #[serde(rename = "system.notification")]
    SystemNotification,
    #[serde(rename = "emergency.alert")]
    EmergencyAlert,
}

impl EventKind {
    /// All topics, for "subscribe to everything" convenience.
    pub const ALL: [EventKind; 15] = [
        EventKind::TrainsetUpdated,
        EventKind::TrainsetStatusChanged,
        EventKind::FitnessUpdated,
        EventKind::JobCardUpdated,
        EventKind::ScheduleUpdated,
        EventKind::DecisionGenerated,
        EventKind::OptimizationStarted,
        EventKind::OptimizationProgress,
        EventKind::OptimizationIteration,
        EventKind::OptimizationCompleted,
        EventKind::OptimizationFailed,
        EventKind::OptimizationCancelled,
        EventKind::MaintenanceAlert,
        EventKind::SystemNotification,
        EventKind::EmergencyAlert,
    ];

    /// Dotted wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TrainsetUpdated => "trainset.updated",
            EventKind::TrainsetStatusChanged => "trainset.status_changed",
            EventKind::FitnessUpdated => "fitness.updated",
            EventKind::JobCardUpdated => "jobcard.updated",
            EventKind::ScheduleUpdated => "schedule.updated",
            EventKind::DecisionGenerated => "decision.generated",
            EventKind::OptimizationStarted => "optimization.started",
            EventKind::OptimizationProgress => "optimization.progress",
            EventKind::OptimizationIteration => "optimization.iteration",
            EventKind::OptimizationCompleted => "optimization.completed",
            EventKind::OptimizationFailed => "optimization.failed",
            EventKind::OptimizationCancelled => "optimization.cancelled",
            EventKind::MaintenanceAlert => "maintenance.alert",
            EventKind::SystemNotification => "system.notification",
            EventKind::EmergencyAlert => "emergency.alert",
        }
    }

    /// Parse a dotted wire name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    /// High-frequency topics where dropping stale entries is acceptable.
    pub fn is_high_frequency(&self) -> bool {
        matches!(
            self,
            EventKind::OptimizationProgress | EventKind::OptimizationIteration
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted event envelope.
///
/// `seq` is a monotonically increasing per-process sequence assigned by the
/// bus. Payload shapes are forward-compatible: readers ignore unknown fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub seq: u64,
    pub kind: EventKind,
    pub emitted_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl Event {
    /// Whether the event must never be dropped and jumps queues.
    pub fn is_emergency(&self) -> bool {
        self.kind == EventKind::EmergencyAlert
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn envelope_shape() {
        let event = Event {
            seq: 7,
            kind: EventKind::DecisionGenerated,
            emitted_at: Utc::now(),
            payload: serde_json::json!({"decision_id": "d-1"}),
        };
        let v: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(v["seq"], 7);
        assert_eq!(v["kind"], "decision.generated");
        assert!(v["emitted_at"].is_string());
    }

    #[test]
    fn unknown_payload_fields_are_preserved_not_fatal() {
        let raw = serde_json::json!({
            "seq": 1,
            "kind": "system.notification",
            "emitted_at": "2026-02-01T00:00:00Z",
            "payload": {"message": "hello", "future_field": true}
        });
        let event: Event = serde_json::from_value(raw).unwrap();
        assert_eq!(event.kind, EventKind::SystemNotification);
        assert_eq!(event.payload["future_field"], true);
    }
}
