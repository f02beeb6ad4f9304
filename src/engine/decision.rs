//! Decision Engine — composes the six rule evaluators into a ranked
//! induction list with an explainable reasoning trail
//!
//! Processing sequence per context snapshot:
//!
//! ```text
//! STEP 1: Run all six rule evaluators per trainset
//! STEP 2: Weighted composite score (certificate 0.25, work-order 0.20,
//!         branding 0.15, mileage 0.15, cleaning 0.15, stabling 0.10)
//! STEP 3: Readiness classification
//! STEP 4: Ranking (desc composite; cert score, mileage deviation,
//!         maintenance due as tie-breaks)
//! STEP 5: Key factors, recommendations, conflicts
//! STEP 6: Deterministic confidence
//! STEP 7: Audit record with context fingerprint
//! ```
//!
//! The engine is a pure synchronous function of the context; persistence and
//! event publishing happen in the command surface.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{defaults, EngineConfig};
use crate::rules::{self, RuleScore};
use crate::store::{Context, StoreError};
use crate::types::{
    Conflict, ConflictKind, ConflictSeverity, FactorImpact, InductionChoice, InductionDecision,
    KeyFactor, RankedTrainset, ReadinessClass, Recommendation, RecommendationKind, RuleScores,
    Trainset,
};

use super::fingerprint;

/// Decision-engine errors
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("context empty: no active trainsets in snapshot")]
    ContextEmpty,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fully evaluated trainset, before ranking.
struct Evaluation {
    trainset: Trainset,
    certificate: RuleScore,
    job_card: RuleScore,
    branding: RuleScore,
    mileage: RuleScore,
    cleaning: RuleScore,
    stabling: RuleScore,
    composite: f64,
    eligible: bool,
    readiness: ReadinessClass,
    mileage_deviation: f64,
}

impl Evaluation {
    fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        for rule in [
            &self.certificate,
            &self.job_card,
            &self.branding,
            &self.mileage,
            &self.cleaning,
            &self.stabling,
        ] {
            out.extend(rule.warnings.iter().cloned());
        }
        out
    }
}

/// The induction decision engine.
///
/// Construct once with a fixed configuration; weights never change within a
/// run, which keeps every decision reproducible from its `inputs_hash`.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: EngineConfig,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Engine using the global depot configuration.
    pub fn from_global_config() -> Self {
        Self::new(crate::config::get().engine.clone())
    }

    /// Clone of this engine with per-request size constraints applied.
    pub fn with_constraints(&self, min_trainsets: Option<usize>, max_trainsets: Option<usize>) -> Self {
        let mut config = self.config.clone();
        if let Some(min) = min_trainsets {
            config.min_trainsets = min;
        }
        if let Some(max) = max_trainsets {
            config.max_trainsets = max;
        }
        Self::new(config)
    }

    /// Produce an induction decision for the given context snapshot.
    pub fn generate(&self, ctx: &Context) -> Result<InductionDecision, DecisionError> {
        let active: Vec<&Trainset> = ctx.active_trainsets().collect();
        if active.is_empty() {
            return Err(DecisionError::ContextEmpty);
        }

        // STEP 1 + 2 + 3: evaluate, compose, classify
        let mut evaluations: Vec<Evaluation> =
            active.into_iter().map(|t| self.evaluate_one(t, ctx)).collect();

        // STEP 4: rank
        evaluations.sort_by(|a, b| Self::ranking_order(a, b));

        // STEP 5a: assign induction choices in rank order
        let choices = self.assign_choices(&evaluations, ctx.taken_at);

        let ranked_list: Vec<RankedTrainset> = evaluations
            .iter()
            .zip(choices.iter())
            .enumerate()
            .map(|(idx, (eval, choice))| RankedTrainset {
                trainset_id: eval.trainset.id.clone(),
                trainset_number: eval.trainset.number.clone(),
                rank: (idx + 1) as u32,
                composite_score: round2(eval.composite),
                readiness: eval.readiness,
                decision: *choice,
                scores: RuleScores {
                    certificate: eval.certificate.score,
                    job_card: eval.job_card.score,
                    branding: eval.branding.score,
                    mileage: eval.mileage.score,
                    cleaning: eval.cleaning.score,
                    stabling: eval.stabling.score,
                },
                mileage_deviation_percent: round2(eval.mileage_deviation * 100.0),
                warnings: eval.warnings(),
            })
            .collect();

        // STEP 5b: conflicts, key factors, recommendations
        let conflicts = self.detect_conflicts(&evaluations, &choices, ctx);
        let key_factors = self.extract_key_factors(&evaluations, ctx.taken_at);
        let recommendations = self.build_recommendations(&evaluations, ctx.taken_at);

        // STEP 6: deterministic confidence
        let confidence = self.score_confidence(&evaluations, &conflicts);

        let warnings: Vec<String> = ranked_list
            .iter()
            .flat_map(|r| r.warnings.iter().cloned())
            .collect();

        let ready = evaluations
            .iter()
            .filter(|e| e.readiness == ReadinessClass::InductionReady)
            .count();
        info!(
            date = %ctx.date,
            shift = %ctx.shift,
            trainsets = evaluations.len(),
            ready,
            conflicts = conflicts.len(),
            confidence,
            "Induction decision generated"
        );

        // STEP 7: audit record
        Ok(InductionDecision {
            id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            date: ctx.date,
            shift: ctx.shift,
            ranked_list,
            warnings,
            conflicts,
            key_factors,
            recommendations,
            confidence,
            inputs_hash: fingerprint::inputs_hash(ctx),
        })
    }

    fn evaluate_one(&self, trainset: &Trainset, ctx: &Context) -> Evaluation {
        let certificate = rules::certificate::evaluate(trainset, ctx);
        let job_card = rules::jobcard::evaluate(trainset, ctx);
        let branding = rules::branding::evaluate(trainset, ctx);
        let mileage = rules::mileage::evaluate(trainset, ctx);
        let cleaning = rules::cleaning::evaluate(trainset, ctx);
        let stabling = rules::stabling::evaluate(trainset, ctx);

        let w = &self.config.weights;
        let composite = certificate.score * w.certificate
            + job_card.score * w.job_card
            + branding.score * w.branding
            + mileage.score * w.mileage
            + cleaning.score * w.cleaning
            + stabling.score * w.stabling;

        let eligible = certificate.can_induct && job_card.can_induct;
        let readiness = if !eligible {
            ReadinessClass::NotReady
        } else if composite >= defaults::READY_THRESHOLD {
            ReadinessClass::InductionReady
        } else if composite >= defaults::CONDITIONAL_THRESHOLD {
            ReadinessClass::ConditionalReady
        } else {
            ReadinessClass::RequiresAttention
        };

        debug!(
            trainset = %trainset.number,
            composite = round2(composite),
            readiness = %readiness,
            "Trainset evaluated"
        );

        Evaluation {
            trainset: trainset.clone(),
            mileage_deviation: ctx.mileage_deviation(trainset),
            certificate,
            job_card,
            branding,
            mileage,
            cleaning,
            stabling,
            composite,
            eligible,
            readiness,
        }
    }

    /// Ranking order: composite desc, then certificate score desc, then
    /// mileage deviation asc, then earlier next-maintenance-due.
    fn ranking_order(a: &Evaluation, b: &Evaluation) -> Ordering {
        b.composite
            .partial_cmp(&a.composite)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.certificate
                    .score
                    .partial_cmp(&a.certificate.score)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| {
                a.mileage_deviation
                    .partial_cmp(&b.mileage_deviation)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| {
                let due = |e: &Evaluation| {
                    e.trainset
                        .next_maintenance_due_at
                        .map_or(i64::MAX, |d| d.timestamp())
                };
                due(a).cmp(&due(b))
            })
            // Stable final tie-break so equal trainsets rank deterministically
            .then_with(|| a.trainset.id.cmp(&b.trainset.id))
    }

    /// Assign an induction choice per ranked trainset: the best eligible up
    /// to `max_trainsets` run, the rest stand by or go to cleaning, and
    /// ineligible trainsets are routed to maintenance.
    fn assign_choices(&self, ranked: &[Evaluation], now: DateTime<Utc>) -> Vec<InductionChoice> {
        let mut in_service = 0usize;
        ranked
            .iter()
            .map(|eval| {
                if !eval.eligible {
                    InductionChoice::Maintenance
                } else if in_service < self.config.max_trainsets {
                    in_service += 1;
                    InductionChoice::InService
                } else if rules::cleaning::needs_cleaning(&eval.trainset, now) {
                    InductionChoice::Cleaning
                } else {
                    InductionChoice::Standby
                }
            })
            .collect()
    }

    fn detect_conflicts(
        &self,
        evaluations: &[Evaluation],
        choices: &[InductionChoice],
        ctx: &Context,
    ) -> Vec<Conflict> {
        let mut conflicts = Vec::new();

        let eligible_ids: Vec<String> = evaluations
            .iter()
            .filter(|e| e.eligible)
            .map(|e| e.trainset.id.clone())
            .collect();
        let ready_ids: Vec<String> = evaluations
            .iter()
            .filter(|e| e.readiness == ReadinessClass::InductionReady)
            .map(|e| e.trainset.id.clone())
            .collect();

        if eligible_ids.len() < self.config.min_trainsets {
            conflicts.push(Conflict {
                kind: ConflictKind::Capacity,
                severity: ConflictSeverity::High,
                description: format!(
                    "Only {} eligible trainsets; service minimum is {}",
                    eligible_ids.len(),
                    self.config.min_trainsets
                ),
                trainset_ids: eligible_ids.clone(),
            });
        } else if ready_ids.len() < self.config.min_ready {
            conflicts.push(Conflict {
                kind: ConflictKind::Capacity,
                severity: ConflictSeverity::Medium,
                description: format!(
                    "Only {} induction-ready trainsets; target is {}",
                    ready_ids.len(),
                    self.config.min_ready
                ),
                trainset_ids: ready_ids,
            });
        }

        // A trainset that was still selected while tripping a critical rule
        // is a hard conflict.
        for (eval, choice) in evaluations.iter().zip(choices.iter()) {
            if *choice == InductionChoice::InService && !eval.eligible {
                conflicts.push(Conflict {
                    kind: ConflictKind::CriticalRule,
                    severity: ConflictSeverity::Critical,
                    description: format!(
                        "Trainset {} selected for service despite failing {}",
                        eval.trainset.number,
                        if eval.certificate.can_induct {
                            "the work-order rule"
                        } else {
                            "the certificate rule"
                        }
                    ),
                    trainset_ids: vec![eval.trainset.id.clone()],
                });
            }
        }

        // Blocked trainsets reduce usable capacity; each is surfaced so the
        // depot can clear the blocking card.
        for eval in evaluations.iter().filter(|e| !e.job_card.can_induct) {
            conflicts.push(Conflict {
                kind: ConflictKind::CriticalRule,
                severity: ConflictSeverity::Medium,
                description: format!(
                    "Trainset {} held by open high-priority work order",
                    eval.trainset.number
                ),
                trainset_ids: vec![eval.trainset.id.clone()],
            });
        }

        // Cleaning demand vs bay capacity (only when slot data is mirrored).
        if !ctx.cleaning_slots.is_empty() {
            let demand = choices
                .iter()
                .filter(|c| **c == InductionChoice::Cleaning)
                .count() as u32;
            let capacity: u32 = ctx.cleaning_slots.iter().map(|s| s.free_capacity()).sum();
            if demand > capacity {
                conflicts.push(Conflict {
                    kind: ConflictKind::CleaningCapacity,
                    severity: ConflictSeverity::Medium,
                    description: format!(
                        "{demand} trainsets need cleaning but only {capacity} bay slots are free"
                    ),
                    trainset_ids: evaluations
                        .iter()
                        .zip(choices.iter())
                        .filter(|(_, c)| **c == InductionChoice::Cleaning)
                        .map(|(e, _)| e.trainset.id.clone())
                        .collect(),
                });
            }
        }

        conflicts
    }

    fn extract_key_factors(
        &self,
        evaluations: &[Evaluation],
        now: DateTime<Utc>,
    ) -> Vec<KeyFactor> {
        let mut factors = Vec::new();

        let expired: Vec<&Evaluation> = evaluations
            .iter()
            .filter(|e| matches!(e.certificate.tag, "EXPIRED" | "ABSENT" | "SUSPENDED" | "REVOKED"))
            .collect();
        let expiring: Vec<&Evaluation> = evaluations
            .iter()
            .filter(|e| e.certificate.tag == "EXPIRING")
            .collect();
        if !expired.is_empty() {
            factors.push(KeyFactor {
                factor: "certificate".to_string(),
                impact: FactorImpact::Critical,
                description: format!(
                    "{} trainset(s) without a usable fitness certificate",
                    expired.len()
                ),
            });
        }
        if !expiring.is_empty() {
            factors.push(KeyFactor {
                factor: "certificate".to_string(),
                impact: FactorImpact::Warning,
                description: format!(
                    "{} trainset(s) with certificates expiring within 14 days",
                    expiring.len()
                ),
            });
        }

        let blocked = evaluations.iter().filter(|e| !e.job_card.can_induct).count();
        if blocked > 0 {
            factors.push(KeyFactor {
                factor: "work_order".to_string(),
                impact: FactorImpact::Critical,
                description: format!("{blocked} trainset(s) held by high-priority work orders"),
            });
        }

        let imbalanced = evaluations
            .iter()
            .filter(|e| e.mileage_deviation > defaults::MILEAGE_BALANCE_THRESHOLD)
            .count();
        if imbalanced > 0 {
            factors.push(KeyFactor {
                factor: "mileage".to_string(),
                impact: FactorImpact::Warning,
                description: format!("{imbalanced} trainset(s) outside the mileage balance band"),
            });
        }

        let overdue = evaluations
            .iter()
            .filter(|e| rules::cleaning::needs_cleaning(&e.trainset, now))
            .count();
        if overdue > 0 {
            factors.push(KeyFactor {
                factor: "cleaning".to_string(),
                impact: FactorImpact::Info,
                description: format!("{overdue} trainset(s) past the cleaning cycle"),
            });
        }

        factors
    }

    fn build_recommendations(
        &self,
        evaluations: &[Evaluation],
        now: DateTime<Utc>,
    ) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        let cert_renewals: Vec<String> = evaluations
            .iter()
            .filter(|e| !e.certificate.can_induct || e.certificate.tag == "EXPIRING")
            .map(|e| e.trainset.id.clone())
            .collect();
        if !cert_renewals.is_empty() {
            recommendations.push(Recommendation {
                kind: RecommendationKind::RenewCertificate,
                message: format!(
                    "Renew fitness certificates for {} trainset(s) before the next shift",
                    cert_renewals.len()
                ),
                trainset_ids: cert_renewals,
                expected_improvement: None,
            });
        }

        let blocked: Vec<String> = evaluations
            .iter()
            .filter(|e| !e.job_card.can_induct)
            .map(|e| e.trainset.id.clone())
            .collect();
        if !blocked.is_empty() {
            recommendations.push(Recommendation {
                kind: RecommendationKind::ScheduleMaintenance,
                message: format!(
                    "Close high-priority work orders on {} trainset(s) to restore capacity",
                    blocked.len()
                ),
                trainset_ids: blocked,
                expected_improvement: None,
            });
        }

        let imbalanced: Vec<String> = evaluations
            .iter()
            .filter(|e| e.mileage_deviation > defaults::MILEAGE_BALANCE_THRESHOLD)
            .map(|e| e.trainset.id.clone())
            .collect();
        if !imbalanced.is_empty() {
            recommendations.push(Recommendation {
                kind: RecommendationKind::BalanceMileage,
                message: format!(
                    "Rebalance running assignments for {} trainset(s) outside the mileage band",
                    imbalanced.len()
                ),
                trainset_ids: imbalanced,
                expected_improvement: None,
            });
        }

        let overdue: Vec<String> = evaluations
            .iter()
            .filter(|e| rules::cleaning::needs_cleaning(&e.trainset, now))
            .map(|e| e.trainset.id.clone())
            .collect();
        if !overdue.is_empty() {
            recommendations.push(Recommendation {
                kind: RecommendationKind::ScheduleCleaning,
                message: format!("Book cleaning bays for {} overdue trainset(s)", overdue.len()),
                trainset_ids: overdue,
                expected_improvement: None,
            });
        }

        let branded: Vec<String> = evaluations
            .iter()
            .filter(|e| !e.branding.warnings.is_empty())
            .map(|e| e.trainset.id.clone())
            .collect();
        if !branded.is_empty() {
            recommendations.push(Recommendation {
                kind: RecommendationKind::PrioritizeBranding,
                message: format!(
                    "Prioritize {} trainset(s) with exposure deficits on high-value campaigns",
                    branded.len()
                ),
                trainset_ids: branded,
                expected_improvement: None,
            });
        }

        recommendations
    }

    /// Confidence starts at 100 and loses fixed deductions per critical rule
    /// violation and per conflict. Fully deterministic.
    fn score_confidence(&self, evaluations: &[Evaluation], conflicts: &[Conflict]) -> f64 {
        let mut confidence: f64 = 100.0;

        for eval in evaluations {
            if !eval.certificate.can_induct {
                confidence -= 5.0;
            }
            if !eval.job_card.can_induct {
                confidence -= 5.0;
            }
        }
        for conflict in conflicts {
            confidence -= match conflict.severity {
                ConflictSeverity::Critical => 15.0,
                ConflictSeverity::High => 10.0,
                ConflictSeverity::Medium => 5.0,
                ConflictSeverity::Low => 2.0,
            };
        }

        confidence.clamp(0.0, 100.0)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
