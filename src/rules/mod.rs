//! Rule Evaluators — six pure scorers over a context snapshot
//!
//! Each evaluator is a pure function `(trainset, context) -> RuleScore` with
//! no side effects, so every rule is independently testable and its warnings
//! appear verbatim in the decision audit.
//!
//! ## Rules and default composite weights
//!
//! 1. **Certificate** (25%): fitness certificate validity and time to expiry
//! 2. **Work order** (20%): open job cards and their priorities
//! 3. **Branding** (15%): advertising exposure commitments at risk
//! 4. **Mileage** (15%): deviation from the fleet mileage mean
//! 5. **Cleaning** (15%): days since last cleaning vs the cleaning cycle
//! 6. **Stabling** (10%): shunting complexity of the current location

pub mod branding;
pub mod certificate;
pub mod cleaning;
pub mod jobcard;
pub mod mileage;
pub mod stabling;

/// Result of one rule evaluation for one trainset.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleScore {
    /// Score in [0, 100]; higher favors induction
    pub score: f64,
    /// Short status tag, e.g. "VALID", "OVERDUE"
    pub tag: &'static str,
    /// Whether this rule permits induction at all
    pub can_induct: bool,
    /// Operator-facing warnings, copied verbatim into the decision audit
    pub warnings: Vec<String>,
}

impl RuleScore {
    /// Clean pass with no warnings.
    pub fn clean(score: f64, tag: &'static str) -> Self {
        Self {
            score,
            tag,
            can_induct: true,
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared fixtures for rule evaluator tests.

    use crate::store::Context;
    use crate::types::{Shift, Trainset, TrainsetStatus};
    use chrono::{NaiveDate, Utc};

    pub fn make_trainset(id: &str) -> Trainset {
        Trainset {
            id: id.to_string(),
            number: id.to_uppercase(),
            manufacturer: "Alstom".to_string(),
            model: "Metropolis".to_string(),
            year_built: 2017,
            capacity: 975,
            max_speed_kmh: 80.0,
            status: TrainsetStatus::Available,
            depot: "Muttom".to_string(),
            location: "Muttom".to_string(),
            current_mileage: 1_000.0,
            total_mileage: 100_000.0,
            operational_hours: 9_000.0,
            last_maintenance_at: None,
            next_maintenance_due_at: None,
            last_cleaning_at: None,
            next_cleaning_at: None,
            fitness_expiry_at: None,
            is_active: true,
            version: 0,
        }
    }

    pub fn make_context(trainsets: Vec<Trainset>) -> Context {
        Context {
            date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            shift: Shift::Night,
            taken_at: Utc::now(),
            trainsets,
            certificates: Vec::new(),
            job_cards: Vec::new(),
            branding: Vec::new(),
            cleaning_slots: Vec::new(),
            schedules: Vec::new(),
        }
    }
}
