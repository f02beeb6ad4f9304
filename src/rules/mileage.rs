//! Mileage rule: deviation from the fleet mileage mean
//!
//! Keeps wear even across the fleet. Deviation direction matters for the
//! balancing hint: low-mileage trainsets should run more, high-mileage ones
//! should rest.

use crate::config::defaults::MILEAGE_BALANCE_THRESHOLD;
use crate::store::Context;
use crate::types::Trainset;

use super::RuleScore;

/// Score a trainset's mileage balance.
///
/// - 100 within 10% of the fleet mean
/// - 60 within 20%
/// - 30 beyond that
pub fn evaluate(trainset: &Trainset, ctx: &Context) -> RuleScore {
    let deviation = ctx.mileage_deviation(trainset);

    let (score, tag) = if deviation <= 0.10 {
        (100.0, "BALANCED")
    } else if deviation <= 0.20 {
        (60.0, balance_tag(trainset, ctx))
    } else {
        (30.0, balance_tag(trainset, ctx))
    };

    let warnings = if deviation > MILEAGE_BALANCE_THRESHOLD {
        let direction = if is_under_run(trainset, ctx) {
            "below fleet mean; prefer induction to balance wear"
        } else {
            "above fleet mean; avoid induction to balance wear"
        };
        vec![format!(
            "Trainset {} mileage deviates {:.0}% ({})",
            trainset.number,
            deviation * 100.0,
            direction
        )]
    } else {
        Vec::new()
    };

    RuleScore {
        score,
        tag,
        can_induct: true,
        warnings,
    }
}

fn is_under_run(trainset: &Trainset, ctx: &Context) -> bool {
    ctx.fleet_mean_mileage()
        .is_some_and(|mean| trainset.current_mileage < mean)
}

fn balance_tag(trainset: &Trainset, ctx: &Context) -> &'static str {
    if is_under_run(trainset, ctx) {
        "UNDER_RUN"
    } else {
        "OVER_RUN"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::fixtures::{make_context, make_trainset};

    /// Fleet of three with mean 1000 km.
    fn fleet_with(subject_mileage: f64) -> (Trainset, Context) {
        let mut subject = make_trainset("ts-001");
        subject.current_mileage = subject_mileage;
        let mut peer_a = make_trainset("ts-002");
        // Peers positioned so the mean stays at 1000 regardless of subject
        peer_a.current_mileage = 1_500.0 - subject_mileage / 2.0;
        let mut peer_b = make_trainset("ts-003");
        peer_b.current_mileage = 1_500.0 - subject_mileage / 2.0;
        let ctx = make_context(vec![subject.clone(), peer_a, peer_b]);
        (subject, ctx)
    }

    #[test]
    fn balanced_fleet_scores_full() {
        let (ts, ctx) = fleet_with(1_050.0);
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.score, 100.0);
        assert!(score.warnings.is_empty());
    }

    #[test]
    fn moderate_deviation_scores_sixty() {
        let (ts, ctx) = fleet_with(1_180.0);
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.score, 60.0);
        assert_eq!(score.tag, "OVER_RUN");
        assert_eq!(score.warnings.len(), 1);
        assert!(score.warnings[0].contains("avoid induction"));
    }

    #[test]
    fn severe_under_run_flagged_for_induction() {
        let (ts, ctx) = fleet_with(600.0);
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.score, 30.0);
        assert_eq!(score.tag, "UNDER_RUN");
        assert!(score.warnings[0].contains("prefer induction"));
    }

    #[test]
    fn single_trainset_fleet_is_trivially_balanced() {
        let ts = make_trainset("ts-001");
        let ctx = make_context(vec![ts.clone()]);
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.score, 100.0);
    }
}
