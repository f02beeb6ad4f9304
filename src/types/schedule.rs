//! Shift, schedule, and induction-choice types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Shift
// ============================================================================

/// Operating shift — the unit of induction planning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Shift {
    Morning,
    Afternoon,
    Evening,
    #[default]
    Night,
}

impl Shift {
    /// Get short code for logging
    pub fn short_code(&self) -> &'static str {
        match self {
            Shift::Morning => "MOR",
            Shift::Afternoon => "AFT",
            Shift::Evening => "EVE",
            Shift::Night => "NGT",
        }
    }

    /// Parse from string (for API/config)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "MORNING" => Some(Shift::Morning),
            "AFTERNOON" => Some(Shift::Afternoon),
            "EVENING" => Some(Shift::Evening),
            "NIGHT" => Some(Shift::Night),
            _ => None,
        }
    }
}

impl std::fmt::Display for Shift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shift::Morning => write!(f, "Morning"),
            Shift::Afternoon => write!(f, "Afternoon"),
            Shift::Evening => write!(f, "Evening"),
            Shift::Night => write!(f, "Night"),
        }
    }
}

// ============================================================================
// Induction Choice
// ============================================================================

/// Per-trainset outcome of an induction decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InductionChoice {
    InService,
    Standby,
    Maintenance,
    Cleaning,
}

impl std::fmt::Display for InductionChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InductionChoice::InService => write!(f, "In Service"),
            InductionChoice::Standby => write!(f, "Standby"),
            InductionChoice::Maintenance => write!(f, "Maintenance"),
            InductionChoice::Cleaning => write!(f, "Cleaning"),
        }
    }
}

// ============================================================================
// Schedule
// ============================================================================

/// One row of a shift schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleEntry {
    pub trainset_id: String,
    pub decision: InductionChoice,
    /// Running-order rank; unique within a shift
    pub rank: u32,
    pub route: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Human-readable reasons supporting the assignment
    pub reasons: Vec<String>,
    /// Conflicts attached to this specific entry
    pub conflicts: Vec<String>,
}

/// Complete induction schedule for a single (date, shift).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub id: String,
    pub date: NaiveDate,
    pub shift: Shift,
    pub entries: Vec<ScheduleEntry>,
    pub generated_at: DateTime<Utc>,
}

impl Schedule {
    /// Rank-uniqueness invariant within the shift.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.rank) {
                violations.push(format!(
                    "duplicate rank {} in schedule {} ({} {})",
                    entry.rank, self.id, self.date, self.shift
                ));
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_wire_format() {
        assert_eq!(serde_json::to_string(&Shift::Night).unwrap(), "\"NIGHT\"");
        assert_eq!(Shift::parse("morning"), Some(Shift::Morning));
        assert_eq!(Shift::parse("bogus"), None);
    }

    #[test]
    fn duplicate_ranks_detected() {
        let entry = |rank| ScheduleEntry {
            trainset_id: format!("ts-{rank}"),
            decision: InductionChoice::InService,
            rank,
            route: None,
            start_time: None,
            end_time: None,
            reasons: Vec::new(),
            conflicts: Vec::new(),
        };
        let schedule = Schedule {
            id: "sch-1".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            shift: Shift::Night,
            entries: vec![entry(1), entry(2), entry(2)],
            generated_at: Utc::now(),
        };
        assert_eq!(schedule.invariant_violations().len(), 1);
    }
}
