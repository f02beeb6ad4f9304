//! Cleaning rule: days since last cleaning vs the cleaning cycle

use crate::config::defaults::CLEANING_CYCLE_DAYS;
use crate::store::Context;
use crate::types::Trainset;

use super::RuleScore;

/// Score a trainset's cleaning freshness against the 7-day cycle.
///
/// - 100 when cleaned within the cycle
/// - 60 at one to two cycles
/// - 20 beyond two cycles (or never cleaned)
pub fn evaluate(trainset: &Trainset, ctx: &Context) -> RuleScore {
    let days_since = trainset
        .last_cleaning_at
        .map(|at| (ctx.taken_at - at).num_days());

    let (score, tag) = match days_since {
        Some(d) if d < CLEANING_CYCLE_DAYS => (100.0, "FRESH"),
        Some(d) if d < 2 * CLEANING_CYCLE_DAYS => (60.0, "DUE"),
        // Never cleaned counts as overdue
        _ => (20.0, "OVERDUE"),
    };

    let warnings = match days_since {
        Some(d) if d >= CLEANING_CYCLE_DAYS => vec![format!(
            "Trainset {} last cleaned {} day(s) ago (cycle is {} days)",
            trainset.number, d, CLEANING_CYCLE_DAYS
        )],
        None => vec![format!(
            "Trainset {} has no cleaning record",
            trainset.number
        )],
        _ => Vec::new(),
    };

    RuleScore {
        score,
        tag,
        can_induct: true,
        warnings,
    }
}

/// Whether the trainset is past its cleaning cycle.
pub fn needs_cleaning(trainset: &Trainset, now: chrono::DateTime<chrono::Utc>) -> bool {
    match trainset.last_cleaning_at {
        Some(at) => (now - at).num_days() >= CLEANING_CYCLE_DAYS,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::fixtures::{make_context, make_trainset};
    use chrono::Duration;

    fn with_last_cleaned(days_ago: Option<i64>) -> (Trainset, Context) {
        let mut ts = make_trainset("ts-001");
        let ctx = make_context(vec![ts.clone()]);
        ts.last_cleaning_at = days_ago.map(|d| ctx.taken_at - Duration::days(d));
        (ts, ctx)
    }

    #[test]
    fn fresh_cleaning_scores_full() {
        let (ts, ctx) = with_last_cleaned(Some(2));
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.score, 100.0);
        assert!(score.warnings.is_empty());
    }

    #[test]
    fn one_cycle_overdue_scores_sixty() {
        let (ts, ctx) = with_last_cleaned(Some(9));
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.score, 60.0);
        assert_eq!(score.tag, "DUE");
        assert_eq!(score.warnings.len(), 1);
    }

    #[test]
    fn two_cycles_overdue_scores_twenty() {
        let (ts, ctx) = with_last_cleaned(Some(15));
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.score, 20.0);
        assert_eq!(score.tag, "OVERDUE");
    }

    #[test]
    fn never_cleaned_is_overdue() {
        let (ts, ctx) = with_last_cleaned(None);
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.score, 20.0);
        assert!(score.warnings[0].contains("no cleaning record"));
        assert!(needs_cleaning(&ts, ctx.taken_at));
    }

    #[test]
    fn needs_cleaning_boundary() {
        let (ts, ctx) = with_last_cleaned(Some(7));
        assert!(needs_cleaning(&ts, ctx.taken_at));
        let (ts, ctx) = with_last_cleaned(Some(6));
        assert!(!needs_cleaning(&ts, ctx.taken_at));
    }
}
