//! Work-order (job card) types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Work-order priority
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobCardPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl JobCardPriority {
    /// Whether an open card at this priority disqualifies induction.
    pub fn blocks_induction(&self) -> bool {
        matches!(self, JobCardPriority::High | JobCardPriority::Critical)
    }
}

impl std::fmt::Display for JobCardPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobCardPriority::Low => write!(f, "Low"),
            JobCardPriority::Medium => write!(f, "Medium"),
            JobCardPriority::High => write!(f, "High"),
            JobCardPriority::Critical => write!(f, "Critical"),
        }
    }
}

/// Work-order lifecycle state. COMPLETED and CANCELLED are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobCardStatus {
    Open,
    InProgress,
    OnHold,
    Completed,
    Cancelled,
}

impl JobCardStatus {
    /// Terminal states accept no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobCardStatus::Completed | JobCardStatus::Cancelled)
    }

    /// Whether the card counts as outstanding work against a trainset.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            JobCardStatus::Open | JobCardStatus::InProgress | JobCardStatus::OnHold
        )
    }
}

impl std::fmt::Display for JobCardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobCardStatus::Open => write!(f, "Open"),
            JobCardStatus::InProgress => write!(f, "In Progress"),
            JobCardStatus::OnHold => write!(f, "On Hold"),
            JobCardStatus::Completed => write!(f, "Completed"),
            JobCardStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// A maintenance work order, typically mirrored from an external CMMS.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobCard {
    pub id: String,
    /// Trainset the card is raised against; fleet-level cards have none
    pub trainset_id: Option<String>,
    /// Identifier in the external maintenance system, if mirrored
    pub external_id: Option<String>,
    pub title: String,
    pub description: String,
    pub priority: JobCardPriority,
    pub status: JobCardStatus,
    /// Free-form category (e.g. "bogie", "HVAC", "doors")
    pub category: String,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobCard {
    /// Whether this card is outstanding against the given trainset.
    pub fn is_open_against(&self, trainset_id: &str) -> bool {
        self.status.is_open() && self.trainset_id.as_deref() == Some(trainset_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering() {
        assert!(JobCardPriority::Critical > JobCardPriority::High);
        assert!(JobCardPriority::High > JobCardPriority::Medium);
        assert!(JobCardPriority::Medium > JobCardPriority::Low);
    }

    #[test]
    fn blocking_priorities() {
        assert!(JobCardPriority::Critical.blocks_induction());
        assert!(JobCardPriority::High.blocks_induction());
        assert!(!JobCardPriority::Medium.blocks_induction());
        assert!(!JobCardPriority::Low.blocks_induction());
    }

    #[test]
    fn terminal_states() {
        assert!(JobCardStatus::Completed.is_terminal());
        assert!(JobCardStatus::Cancelled.is_terminal());
        assert!(!JobCardStatus::OnHold.is_terminal());
        assert!(JobCardStatus::OnHold.is_open());
        assert!(!JobCardStatus::Completed.is_open());
    }
}
