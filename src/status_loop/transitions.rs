//! Status transition graph
//!
//! The only edges the status loop (or an operator action routed through it)
//! may take. Self-loops are ignored; everything else is refused and logged.
//! A fitness expiry may force any state to OUT_OF_ORDER, overriding other
//! pending transitions.

use crate::types::TrainsetStatus;

/// Audit reason strings. These appear verbatim in `status_audit` rows.
pub const REASON_DAILY_CLEANING: &str = "Scheduled daily cleaning";
pub const REASON_CLEANING_DONE: &str = "Cleaning completed";
pub const REASON_FITNESS_EXPIRED: &str = "Fitness certificate expired";
pub const REASON_FITNESS_RENEWED: &str = "Fitness certificate renewed";
pub const REASON_MAINTENANCE_DUE: &str = "Maintenance due";
pub const REASON_MAINTENANCE_DONE: &str = "Maintenance completed";

/// Whether the edge `from -> to` is in the transition graph.
///
/// Self-loops return `false`: they are ignored rather than refused, and the
/// caller simply skips them.
pub fn allowed(from: TrainsetStatus, to: TrainsetStatus) -> bool {
    use TrainsetStatus::{Available, Cleaning, InService, Maintenance, OutOfOrder};

    if from == to {
        return false;
    }
    match (from, to) {
        // Fitness expiry overrides everything
        (_, OutOfOrder) => true,
        (Available, Maintenance | Cleaning) => true,
        (InService, Maintenance | Cleaning) => true,
        (Maintenance, Available) => true,
        (Cleaning, Available) => true,
        (OutOfOrder, Available) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrainsetStatus::*;

    #[test]
    fn permitted_edges() {
        assert!(allowed(Available, Maintenance));
        assert!(allowed(Available, Cleaning));
        assert!(allowed(InService, Maintenance));
        assert!(allowed(InService, Cleaning));
        assert!(allowed(Maintenance, Available));
        assert!(allowed(Cleaning, Available));
        assert!(allowed(OutOfOrder, Available));
    }

    #[test]
    fn any_state_may_fail_to_out_of_order() {
        for from in [Available, InService, Maintenance, Cleaning, Inspection] {
            assert!(allowed(from, OutOfOrder), "{from:?} -> OutOfOrder");
        }
    }

    #[test]
    fn refused_edges() {
        assert!(!allowed(Maintenance, Cleaning));
        assert!(!allowed(Cleaning, Maintenance));
        assert!(!allowed(Cleaning, InService));
        assert!(!allowed(OutOfOrder, InService));
        assert!(!allowed(Inspection, Available));
    }

    #[test]
    fn self_loops_are_ignored() {
        for status in [Available, InService, Maintenance, Cleaning, OutOfOrder, Inspection] {
            assert!(!allowed(status, status));
        }
    }
}
