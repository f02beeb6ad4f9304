//! Advertising / branding exposure types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An exterior-wrap advertising contract bound to a specific trainset.
///
/// `target_hours_per_day` is the contractual exposure commitment;
/// `delivered_hours` is the cumulative exposure credited so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrandingRecord {
    pub id: String,
    pub trainset_id: String,
    /// Campaign / advertiser name
    pub campaign: String,
    /// Commercial priority tier, 1 (lowest) to 100 (highest)
    pub priority: u8,
    pub target_hours_per_day: f64,
    pub delivered_hours: f64,
    pub contract_start: DateTime<Utc>,
    pub contract_end: DateTime<Utc>,
}

impl BrandingRecord {
    /// Whether the contract is live at the given instant.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.contract_start && now <= self.contract_end
    }

    /// Whole days remaining on the contract (0 when past end).
    pub fn remaining_days(&self, now: DateTime<Utc>) -> i64 {
        (self.contract_end - now).num_days().max(0)
    }

    /// Exposure hours still owed over the contract so far, given the daily
    /// target applied to elapsed contract days.
    pub fn exposure_deficit_hours(&self, now: DateTime<Utc>) -> f64 {
        let elapsed_days = (now - self.contract_start).num_days().max(0) as f64;
        let owed = self.target_hours_per_day * elapsed_days;
        (owed - self.delivered_hours).max(0.0)
    }
}
