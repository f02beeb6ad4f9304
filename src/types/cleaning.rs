//! Cleaning bay slot types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bookable interval on a physical cleaning bay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CleaningSlot {
    pub id: String,
    /// Bay identifier within the depot
    pub bay: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Maximum trainsets the bay can hold during this slot
    pub capacity: u32,
    pub assigned_trainset_ids: Vec<String>,
}

impl CleaningSlot {
    /// Remaining assignment capacity.
    pub fn free_capacity(&self) -> u32 {
        self.capacity
            .saturating_sub(self.assigned_trainset_ids.len() as u32)
    }

    /// Whether the slot has room for another trainset.
    pub fn has_capacity(&self) -> bool {
        self.free_capacity() > 0
    }

    /// Whether two slots on the same bay overlap in time.
    pub fn overlaps(&self, other: &CleaningSlot) -> bool {
        self.bay == other.bay && self.starts_at < other.ends_at && other.starts_at < self.ends_at
    }

    /// Capacity invariant: assignments never exceed capacity.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if (self.assigned_trainset_ids.len() as u32) > self.capacity {
            violations.push(format!(
                "slot {} on bay {} holds {} trainsets over capacity {}",
                self.id,
                self.bay,
                self.assigned_trainset_ids.len(),
                self.capacity
            ));
        }
        if self.ends_at <= self.starts_at {
            violations.push(format!("slot {} has non-positive duration", self.id));
        }
        violations
    }
}
