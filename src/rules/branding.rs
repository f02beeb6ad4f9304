//! Branding rule: advertising exposure commitments at risk
//!
//! Trainsets carrying campaigns that are behind on contracted exposure are
//! pushed up the running order: the score rises with the exposure deficit,
//! weighted by the campaign's priority tier.

use crate::store::Context;
use crate::types::Trainset;

use super::RuleScore;

/// Neutral score for trainsets without active campaigns.
const NEUTRAL_SCORE: f64 = 70.0;

/// Priority tier at or above which a campaign is always flagged.
const HIGH_PRIORITY_TIER: u8 = 80;

/// Deficit urgency above which a campaign is flagged.
const HIGH_DEFICIT_URGENCY: f64 = 0.5;

/// Score a trainset's branding obligations.
pub fn evaluate(trainset: &Trainset, ctx: &Context) -> RuleScore {
    let now = ctx.taken_at;
    let active = ctx.active_branding_for(&trainset.id);

    if active.is_empty() {
        return RuleScore::clean(NEUTRAL_SCORE, "NO_CAMPAIGN");
    }

    // Most urgent campaign wins: deficit relative to what the remaining
    // contract days can still deliver, weighted by priority tier.
    let mut best_urgency = 0.0_f64;
    let mut warnings = Vec::new();
    let mut flagged = false;

    for record in &active {
        let deficit = record.exposure_deficit_hours(now);
        let remaining_days = record.remaining_days(now).max(1) as f64;
        let recoverable = remaining_days * record.target_hours_per_day;
        let deficit_urgency = if recoverable > 0.0 {
            (deficit / recoverable).min(1.0)
        } else if deficit > 0.0 {
            1.0
        } else {
            0.0
        };
        let priority_factor = f64::from(record.priority) / 100.0;
        let urgency = deficit_urgency * priority_factor;
        best_urgency = best_urgency.max(urgency);

        if record.priority >= HIGH_PRIORITY_TIER || deficit_urgency > HIGH_DEFICIT_URGENCY {
            flagged = true;
            warnings.push(format!(
                "Campaign '{}' on {} is {:.0}h behind target with {} day(s) left",
                record.campaign,
                trainset.number,
                deficit,
                record.remaining_days(now)
            ));
        }
    }

    let score = (NEUTRAL_SCORE + 30.0 * best_urgency).min(100.0);
    let tag = if best_urgency > 0.0 {
        "EXPOSURE_DEFICIT"
    } else {
        "ON_TRACK"
    };

    RuleScore {
        score,
        tag,
        can_induct: true,
        warnings: if flagged { warnings } else { Vec::new() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::fixtures::{make_context, make_trainset};
    use crate::types::BrandingRecord;
    use chrono::Duration;

    fn make_record(priority: u8, delivered: f64) -> BrandingRecord {
        let now = chrono::Utc::now();
        BrandingRecord {
            id: "br-1".to_string(),
            trainset_id: "ts-001".to_string(),
            campaign: "CityBank".to_string(),
            priority,
            target_hours_per_day: 10.0,
            delivered_hours: delivered,
            contract_start: now - Duration::days(10),
            contract_end: now + Duration::days(10),
        }
    }

    #[test]
    fn no_campaign_is_neutral() {
        let ts = make_trainset("ts-001");
        let ctx = make_context(vec![ts.clone()]);
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.score, NEUTRAL_SCORE);
        assert_eq!(score.tag, "NO_CAMPAIGN");
    }

    #[test]
    fn on_track_campaign_stays_neutral() {
        let ts = make_trainset("ts-001");
        let mut ctx = make_context(vec![ts.clone()]);
        // Delivered exactly what 10 elapsed days owe
        ctx.branding.push(make_record(50, 100.0));
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.tag, "ON_TRACK");
        assert!(score.warnings.is_empty());
    }

    #[test]
    fn deficit_raises_score() {
        let ts = make_trainset("ts-001");
        let mut ctx = make_context(vec![ts.clone()]);
        ctx.branding.push(make_record(50, 0.0)); // 100h behind
        let score = evaluate(&ts, &ctx);
        assert!(score.score > NEUTRAL_SCORE);
        assert_eq!(score.tag, "EXPOSURE_DEFICIT");
    }

    #[test]
    fn high_priority_deficit_is_flagged() {
        let ts = make_trainset("ts-001");
        let mut ctx = make_context(vec![ts.clone()]);
        ctx.branding.push(make_record(90, 0.0));
        let score = evaluate(&ts, &ctx);
        assert!(!score.warnings.is_empty());
        assert!(score.warnings[0].contains("behind target"));
        assert!(score.score > 90.0);
    }

    #[test]
    fn expired_contract_ignored() {
        let ts = make_trainset("ts-001");
        let mut ctx = make_context(vec![ts.clone()]);
        let mut record = make_record(90, 0.0);
        record.contract_end = chrono::Utc::now() - Duration::days(1);
        ctx.branding.push(record);
        let score = evaluate(&ts, &ctx);
        assert_eq!(score.tag, "NO_CAMPAIGN");
    }
}
