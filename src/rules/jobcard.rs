//! Work-order rule: open job cards against the trainset

use crate::store::Context;
use crate::types::Trainset;

use super::RuleScore;

/// Score a trainset's outstanding work orders.
///
/// - 20 when any CRITICAL or HIGH card is open (and induction is blocked)
/// - 40 with more than three open cards
/// - 70 with one to three open cards
/// - 100 with a clean sheet
pub fn evaluate(trainset: &Trainset, ctx: &Context) -> RuleScore {
    let open = ctx.open_job_cards_for(&trainset.id);
    let blocking: Vec<_> = open
        .iter()
        .filter(|card| card.priority.blocks_induction())
        .collect();

    if !blocking.is_empty() {
        let warnings = blocking
            .iter()
            .map(|card| {
                format!(
                    "Trainset {} has open {} work order: {}",
                    trainset.number, card.priority, card.title
                )
            })
            .collect();
        return RuleScore {
            score: 20.0,
            tag: "BLOCKED",
            can_induct: false,
            warnings,
        };
    }

    let (score, tag) = match open.len() {
        0 => (100.0, "CLEAR"),
        1..=3 => (70.0, "OPEN_WORK"),
        _ => (40.0, "BACKLOG"),
    };

    let warnings = if open.len() > 3 {
        vec![format!(
            "Trainset {} carries {} open work orders",
            trainset.number,
            open.len()
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
    use crate::types::{JobCard, JobCardPriority, JobCardStatus};

    fn make_card(id: &str, priority: JobCardPriority, status: JobCardStatus) -> JobCard {
        JobCard {
            id: id.to_string(),
            trainset_id: Some("ts-001".to_string()),
            external_id: None,
            title: format!("work {id}"),
            description: String::new(),
            priority,
            status,
            category: "bogie".to_string(),
            estimated_hours: None,
            actual_hours: None,
            scheduled_at: None,
            due_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn clean_sheet_scores_full() {
        let ts = make_trainset("ts-001");
        let ctx = make_context(vec![ts.clone()]);
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.score, 100.0);
        assert!(score.can_induct);
    }

    #[test]
    fn critical_card_blocks() {
        let ts = make_trainset("ts-001");
        let mut ctx = make_context(vec![ts.clone()]);
        ctx.job_cards
            .push(make_card("jc-1", JobCardPriority::Critical, JobCardStatus::Open));
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.score, 20.0);
        assert!(!score.can_induct);
        assert!(score.warnings[0].contains("Critical"));
    }

    #[test]
    fn few_open_cards_reduce_score() {
        let ts = make_trainset("ts-001");
        let mut ctx = make_context(vec![ts.clone()]);
        ctx.job_cards
            .push(make_card("jc-1", JobCardPriority::Low, JobCardStatus::Open));
        ctx.job_cards
            .push(make_card("jc-2", JobCardPriority::Medium, JobCardStatus::InProgress));
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.score, 70.0);
        assert!(score.can_induct);
    }

    #[test]
    fn backlog_scores_low_with_warning() {
        let ts = make_trainset("ts-001");
        let mut ctx = make_context(vec![ts.clone()]);
        for i in 0..4 {
            ctx.job_cards.push(make_card(
                &format!("jc-{i}"),
                JobCardPriority::Low,
                JobCardStatus::Open,
            ));
        }
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.score, 40.0);
        assert_eq!(score.warnings.len(), 1);
    }

    #[test]
    fn completed_cards_ignored() {
        let ts = make_trainset("ts-001");
        let mut ctx = make_context(vec![ts.clone()]);
        ctx.job_cards.push(make_card(
            "jc-1",
            JobCardPriority::Critical,
            JobCardStatus::Completed,
        ));
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.score, 100.0);
        assert!(score.can_induct);
    }
}
