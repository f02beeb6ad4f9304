//! Stabling rule: shunting complexity of the current location
//!
//! A trainset parked away from its home depot needs extra shunting moves to
//! reach the mainline; terminal sidings add another move.

use crate::store::Context;
use crate::types::Trainset;

use super::RuleScore;

/// Shunting complexity for a trainset's current stabling position.
///
/// `+2` when stabled away from the home depot, `+1` when the location is a
/// terminal siding.
pub fn shunting_complexity(trainset: &Trainset) -> u32 {
    let mut complexity = 0;
    if !trainset.at_home_depot() {
        complexity += 2;
    }
    if trainset.location.to_lowercase().contains("terminal") {
        complexity += 1;
    }
    complexity
}

/// Score stabling geometry: 100 / 60 / 30 for complexity 0 / 1–3 / >3.
pub fn evaluate(trainset: &Trainset, _ctx: &Context) -> RuleScore {
    let complexity = shunting_complexity(trainset);

    let (score, tag) = match complexity {
        0 => (100.0, "HOME"),
        1..=3 => (60.0, "REMOTE"),
        _ => (30.0, "REMOTE"),
    };

    let warnings = if complexity > 0 {
        vec![format!(
            "Trainset {} stabled at '{}' (shunting complexity {})",
            trainset.number, trainset.location, complexity
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::fixtures::{make_context, make_trainset};

    #[test]
    fn home_depot_scores_full() {
        let ts = make_trainset("ts-001");
        let ctx = make_context(vec![ts.clone()]);
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.score, 100.0);
        assert_eq!(score.tag, "HOME");
        assert_eq!(shunting_complexity(&ts), 0);
    }

    #[test]
    fn away_from_depot_adds_two() {
        let mut ts = make_trainset("ts-001");
        ts.location = "Aluva Siding".to_string();
        assert_eq!(shunting_complexity(&ts), 2);
        let ctx = make_context(vec![ts.clone()]);
        assert_eq!(evaluate(&ts, &ctx).score, 60.0);
    }

    #[test]
    fn terminal_adds_one() {
        let mut ts = make_trainset("ts-001");
        ts.location = "Aluva Terminal".to_string();
        assert_eq!(shunting_complexity(&ts), 3);
        let ctx = make_context(vec![ts.clone()]);
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.score, 60.0);
        assert_eq!(score.warnings.len(), 1);
    }
}
