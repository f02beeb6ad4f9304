//! Status transition audit and sweep report types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::trainset::TrainsetStatus;

/// One audited status transition applied by the status loop or an operator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusAudit {
    pub id: String,
    pub trainset_id: String,
    pub from_status: TrainsetStatus,
    pub to_status: TrainsetStatus,
    /// Human-readable trigger, e.g. "Scheduled daily cleaning"
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Result of one status sweep over the fleet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SweepReport {
    /// Trainsets examined
    pub examined: usize,
    /// Transitions applied this sweep
    pub transitions: Vec<StatusAudit>,
    /// Per-trainset errors; a failure never aborts the sweep
    pub errors: Vec<String>,
}

impl SweepReport {
    /// Whether the sweep changed any trainset.
    pub fn changed_fleet(&self) -> bool {
        !self.transitions.is_empty()
    }
}
