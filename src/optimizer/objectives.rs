//! Objective scorers for the induction-set optimizer
//!
//! Per-trainset features are computed once per run into an
//! [`EvaluationCache`]; every individual evaluation then reduces to cheap
//! arithmetic over the selected subset. All five objectives land in [0, 100].
//!
//! The reliability objective has no single canonical formula in operations
//! practice; the default here blends trainset age with outstanding work
//! orders, and is isolated in [`reliability`] so deployments can retune it.

use chrono::{DateTime, Datelike, Utc};

use crate::rules;
use crate::store::Context;
use crate::types::ObjectiveScores;

/// Pre-computed per-trainset features.
#[derive(Debug, Clone)]
pub struct TrainsetFeatures {
    pub id: String,
    pub number: String,
    /// Certificate rule score
    pub cert_score: f64,
    /// Work-order rule score
    pub jobcard_score: f64,
    /// Whether certificate + work-order rules permit induction
    pub eligible: bool,
    /// Open job cards against the trainset
    pub open_cards: usize,
    /// Age in years at the snapshot instant
    pub age_years: f64,
    /// Mileage deviation from fleet mean (fraction)
    pub mileage_deviation: f64,
    /// Shunting complexity of the stabling position
    pub shunting_complexity: u32,
    /// Sum of priority tiers of active campaigns on this trainset
    pub branding_priority: f64,
    /// Maintenance due within 48h of the snapshot
    pub maintenance_due_soon: bool,
}

/// Per-run evaluation cache: features for every active trainset plus
/// fleet-level aggregates.
#[derive(Debug, Clone)]
pub struct EvaluationCache {
    pub features: Vec<TrainsetFeatures>,
    /// Indices into `features` of induction-eligible trainsets
    pub eligible: Vec<usize>,
    /// Total priority mass of all active campaigns fleet-wide
    pub total_branding_priority: f64,
    pub taken_at: DateTime<Utc>,
}

impl EvaluationCache {
    /// Build the cache from a context snapshot.
    pub fn build(ctx: &Context) -> Self {
        let now = ctx.taken_at;
        let mut features = Vec::new();
        let mut total_branding_priority = 0.0;

        for trainset in ctx.active_trainsets() {
            let cert = rules::certificate::evaluate(trainset, ctx);
            let jobcard = rules::jobcard::evaluate(trainset, ctx);
            let branding_priority: f64 = ctx
                .active_branding_for(&trainset.id)
                .iter()
                .map(|b| f64::from(b.priority))
                .sum();
            total_branding_priority += branding_priority;

            let maintenance_due_soon = trainset
                .next_maintenance_due_at
                .is_some_and(|due| (due - now).num_hours() <= 48);

            features.push(TrainsetFeatures {
                id: trainset.id.clone(),
                number: trainset.number.clone(),
                eligible: cert.can_induct && jobcard.can_induct,
                cert_score: cert.score,
                jobcard_score: jobcard.score,
                open_cards: ctx.open_job_cards_for(&trainset.id).len(),
                age_years: (f64::from(now.year()) - f64::from(trainset.year_built)).max(0.0),
                mileage_deviation: ctx.mileage_deviation(trainset),
                shunting_complexity: rules::stabling::shunting_complexity(trainset),
                branding_priority,
                maintenance_due_soon,
            });
        }

        let eligible = features
            .iter()
            .enumerate()
            .filter(|(_, f)| f.eligible)
            .map(|(i, _)| i)
            .collect();

        Self {
            features,
            eligible,
            total_branding_priority,
            taken_at: now,
        }
    }

    /// Score all five objectives for a subset (indices into `features`).
    pub fn score(&self, subset: &[usize]) -> ObjectiveScores {
        ObjectiveScores {
            service_readiness: self.service_readiness(subset),
            reliability: self.reliability(subset),
            cost_efficiency: self.cost_efficiency(subset),
            branding_exposure: self.branding_exposure(subset),
            energy_efficiency: self.energy_efficiency(subset),
        }
    }

    /// Mean certificate/work-order readiness of the selected trainsets.
    fn service_readiness(&self, subset: &[usize]) -> f64 {
        self.mean_over(subset, |f| 0.5 * f.cert_score + 0.5 * f.jobcard_score)
    }

    /// Default reliability model: newer trainsets with fewer outstanding
    /// work orders score higher.
    fn reliability(&self, subset: &[usize]) -> f64 {
        self.mean_over(subset, |f| {
            let age_penalty = (f.age_years * 2.5).min(40.0);
            let work_penalty = (f.open_cards as f64 * 10.0).min(30.0);
            (100.0 - age_penalty - work_penalty).max(0.0)
        })
    }

    /// Shunting moves and imminent maintenance drive avoidable cost.
    fn cost_efficiency(&self, subset: &[usize]) -> f64 {
        self.mean_over(subset, |f| {
            let shunting_penalty = f64::from(f.shunting_complexity) * 15.0;
            let maintenance_penalty = if f.maintenance_due_soon { 20.0 } else { 0.0 };
            (100.0 - shunting_penalty - maintenance_penalty).max(0.0)
        })
    }

    /// Fraction of fleet-wide campaign priority mass that the selection puts
    /// into revenue service.
    fn branding_exposure(&self, subset: &[usize]) -> f64 {
        if self.total_branding_priority <= 0.0 {
            return 100.0;
        }
        let selected: f64 = subset
            .iter()
            .map(|&i| self.features[i].branding_priority)
            .sum();
        (selected / self.total_branding_priority * 100.0).min(100.0)
    }

    /// Mileage balance of the selection, with a mild preference for newer
    /// stock (regenerative braking efficiency drops with age).
    fn energy_efficiency(&self, subset: &[usize]) -> f64 {
        self.mean_over(subset, |f| {
            let balance_penalty = (f.mileage_deviation * 150.0).min(60.0);
            let age_penalty = (f.age_years * 1.5).min(30.0);
            (100.0 - balance_penalty - age_penalty).max(0.0)
        })
    }

    fn mean_over(&self, subset: &[usize], per: impl Fn(&TrainsetFeatures) -> f64) -> f64 {
        if subset.is_empty() {
            return 0.0;
        }
        let sum: f64 = subset.iter().map(|&i| per(&self.features[i])).sum();
        (sum / subset.len() as f64).clamp(0.0, 100.0)
    }

    /// Map subset indices back to trainset ids, preserving running order.
    pub fn ids_for(&self, subset: &[usize]) -> Vec<String> {
        subset.iter().map(|&i| self.features[i].id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::fixtures::{make_context, make_trainset};
    use crate::types::{CertificateStatus, FitnessCertificate};
    use chrono::Duration;

    fn eligible_context(n: usize) -> Context {
        let trainsets = (0..n)
            .map(|i| {
                let mut t = make_trainset(&format!("ts-{i:03}"));
                t.current_mileage = 1_000.0;
                t
            })
            .collect();
        let mut ctx = make_context(trainsets);
        let now = ctx.taken_at;
        for i in 0..n {
            ctx.certificates.push(FitnessCertificate {
                id: format!("fc-{i}"),
                trainset_id: format!("ts-{i:03}"),
                issued_at: now - Duration::days(100),
                expires_at: now + Duration::days(100),
                status: CertificateStatus::Valid,
                issuing_authority: "CMRS".to_string(),
            });
        }
        ctx
    }

    #[test]
    fn cache_tracks_eligibility() {
        let mut ctx = eligible_context(5);
        // Expire one certificate
        ctx.certificates[0].expires_at = ctx.taken_at - Duration::days(1);
        let cache = EvaluationCache::build(&ctx);
        assert_eq!(cache.features.len(), 5);
        assert_eq!(cache.eligible.len(), 4);
        assert!(!cache.features[0].eligible);
    }

    #[test]
    fn healthy_subset_scores_high_on_readiness() {
        let ctx = eligible_context(6);
        let cache = EvaluationCache::build(&ctx);
        let scores = cache.score(&[0, 1, 2]);
        assert_eq!(scores.service_readiness, 100.0);
        assert!(scores.reliability > 50.0);
    }

    #[test]
    fn branding_exposure_follows_selected_campaign_mass() {
        let mut ctx = eligible_context(4);
        let now = ctx.taken_at;
        for (i, priority) in [(0usize, 60u8), (1, 40)] {
            ctx.branding.push(crate::types::BrandingRecord {
                id: format!("br-{i}"),
                trainset_id: format!("ts-{i:03}"),
                campaign: "X".to_string(),
                priority,
                target_hours_per_day: 10.0,
                delivered_hours: 0.0,
                contract_start: now - Duration::days(1),
                contract_end: now + Duration::days(30),
            });
        }
        let cache = EvaluationCache::build(&ctx);
        assert_eq!(cache.score(&[0, 1]).branding_exposure, 100.0);
        assert_eq!(cache.score(&[0, 2]).branding_exposure, 60.0);
        assert_eq!(cache.score(&[2, 3]).branding_exposure, 0.0);
    }

    #[test]
    fn no_campaigns_means_full_exposure() {
        let ctx = eligible_context(3);
        let cache = EvaluationCache::build(&ctx);
        assert_eq!(cache.score(&[0]).branding_exposure, 100.0);
    }

    #[test]
    fn empty_subset_scores_zero() {
        let ctx = eligible_context(3);
        let cache = EvaluationCache::build(&ctx);
        assert_eq!(cache.score(&[]).service_readiness, 0.0);
    }
}
