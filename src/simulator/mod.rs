//! What-If Simulator — typed overlays over immutable snapshots
//!
//! Takes a base scenario plus named variations, re-runs the decision engine
//! and optimizer per scenario on in-memory copies, and compares outcomes.
//! The persisted store is never touched: overlays mutate only the cloned
//! context.
//!
//! Results are memoized under a stable simulation id (an md5 digest of the
//! request), so repeated identical what-if calls are free.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use tracing::{info, warn};

use crate::config::OptimizerConfig;
use crate::engine::{DecisionEngine, DecisionError};
use crate::optimizer::{self, OptimizeError};
use crate::store::{Context, FleetStore, StoreError};
use crate::types::{
    CertificateStatus, MetricDelta, OptimizationParameters, Recommendation, RecommendationKind,
    ReadinessClass, ScenarioBase, ScenarioComparison, ScenarioMetrics, ScenarioOutcome,
    ScenarioVariation, SimulationResult,
};

/// Simulator errors
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Decision(#[from] DecisionError),
    #[error("variation '{variation}' references unknown {entity}: {id}")]
    UnknownEntity {
        variation: String,
        entity: &'static str,
        id: String,
    },
}

/// The what-if simulator.
pub struct WhatIfSimulator {
    store: Arc<dyn FleetStore>,
    engine: DecisionEngine,
    optimizer_config: OptimizerConfig,
    memo: DashMap<String, SimulationResult>,
}

impl WhatIfSimulator {
    pub fn new(
        store: Arc<dyn FleetStore>,
        engine: DecisionEngine,
        optimizer_config: OptimizerConfig,
    ) -> Self {
        Self {
            store,
            engine,
            optimizer_config,
            memo: DashMap::new(),
        }
    }

    /// Stable id for a simulation request.
    pub fn simulation_id(base: &ScenarioBase, variations: &[ScenarioVariation]) -> String {
        let canon = serde_json::to_string(&(base, variations)).unwrap_or_default();
        format!("{:x}", md5::compute(canon.as_bytes()))
    }

    /// Previously computed result, if any.
    pub fn get(&self, simulation_id: &str) -> Option<SimulationResult> {
        self.memo.get(simulation_id).map(|r| r.value().clone())
    }

    /// Run the base scenario and every variation, compare, and memoize.
    pub fn run(
        &self,
        base: &ScenarioBase,
        variations: &[ScenarioVariation],
    ) -> Result<SimulationResult, SimulationError> {
        let simulation_id = Self::simulation_id(base, variations);
        if let Some(cached) = self.get(&simulation_id) {
            info!(simulation_id, "What-if simulation served from memo");
            return Ok(cached);
        }

        let params = base
            .optimizer_preferences
            .clone()
            .unwrap_or_default();
        let snapshot = self.store.snapshot(base.date, base.shift)?;

        let base_outcome = self.evaluate_scenario("base", snapshot.clone(), &params)?;

        let mut variation_outcomes = Vec::with_capacity(variations.len());
        for variation in variations {
            let mut overlaid = snapshot.clone();
            apply_variation(&mut overlaid, variation)?;
            variation_outcomes.push(self.evaluate_scenario(&variation.name, overlaid, &params)?);
        }

        let comparison = compare(&base_outcome, &variation_outcomes);
        let recommendations = simulation_recommendations(&base_outcome, &comparison);

        let result = SimulationResult {
            simulation_id: simulation_id.clone(),
            requested_at: Utc::now(),
            base: base_outcome,
            variations: variation_outcomes,
            comparison,
            recommendations,
        };
        self.memo.insert(simulation_id.clone(), result.clone());
        info!(
            simulation_id,
            variations = variations.len(),
            best = %result.comparison.best_scenario,
            "What-if simulation complete"
        );
        Ok(result)
    }

    /// Run decision + optimization for one scenario context.
    fn evaluate_scenario(
        &self,
        name: &str,
        ctx: Context,
        params: &OptimizationParameters,
    ) -> Result<ScenarioOutcome, SimulationError> {
        let decision = self.engine.generate(&ctx)?;
        let conflict_count = decision.conflicts.len();
        let ready_count = decision.count_in_class(ReadinessClass::InductionReady);

        // Scenario-level deadline mirrors a worker run's hard budget
        let deadline =
            Instant::now() + Duration::from_secs(self.optimizer_config.run_hard_timeout_secs);
        let metrics = match optimizer::optimize_snapshot(&ctx, params, Some(deadline)) {
            Ok(optimization) => {
                let objectives = optimization
                    .best
                    .as_ref()
                    .map(|b| b.objectives)
                    .unwrap_or_default();
                ScenarioMetrics {
                    service_readiness: objectives.service_readiness,
                    reliability: objectives.reliability,
                    cost_efficiency: objectives.cost_efficiency,
                    branding_exposure: objectives.branding_exposure,
                    energy_efficiency: objectives.energy_efficiency,
                    overall_score: objectives.weighted(&params.weights),
                    constraint_violations: optimization
                        .best
                        .as_ref()
                        .map_or(0, |b| b.violations.len()),
                    recommendation_count: decision.recommendations.len()
                        + optimization.report.recommendations.len(),
                }
            }
            Err(OptimizeError::NoEligibleTrainsets { eligible, required }) => {
                warn!(
                    scenario = name,
                    eligible, required, "Scenario cannot field a service set"
                );
                ScenarioMetrics {
                    constraint_violations: 1,
                    recommendation_count: decision.recommendations.len(),
                    ..ScenarioMetrics::default()
                }
            }
            Err(e) => {
                warn!(scenario = name, error = %e, "Scenario optimization failed");
                ScenarioMetrics {
                    recommendation_count: decision.recommendations.len(),
                    ..ScenarioMetrics::default()
                }
            }
        };

        Ok(ScenarioOutcome {
            name: name.to_string(),
            metrics,
            conflict_count,
            ready_count,
        })
    }
}

/// Apply one variation's typed overlays onto a context copy, in order.
fn apply_variation(ctx: &mut Context, variation: &ScenarioVariation) -> Result<(), SimulationError> {
    for m in &variation.fitness_modifications {
        // Mutate the certificate the rules would read: latest expiry wins
        let idx = ctx
            .certificates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.trainset_id == m.trainset_id)
            .max_by_key(|(_, c)| c.expires_at)
            .map(|(i, _)| i)
            .ok_or_else(|| SimulationError::UnknownEntity {
                variation: variation.name.clone(),
                entity: "certificate for trainset",
                id: m.trainset_id.clone(),
            })?;
        if let Some(expires_at) = m.new_expires_at {
            ctx.certificates[idx].expires_at = expires_at;
            if let Some(ts) = ctx.trainsets.iter_mut().find(|t| t.id == m.trainset_id) {
                ts.fitness_expiry_at = Some(expires_at);
            }
        }
        if let Some(status) = m.new_status {
            ctx.certificates[idx].status = status;
            // A renewal overlay also clears a stale derived expiry
            if status == CertificateStatus::Valid {
                let expires = ctx.certificates[idx].expires_at;
                if let Some(ts) = ctx.trainsets.iter_mut().find(|t| t.id == m.trainset_id) {
                    ts.fitness_expiry_at = Some(expires);
                }
            }
        }
    }

    for m in &variation.jobcard_modifications {
        let card = ctx
            .job_cards
            .iter_mut()
            .find(|j| j.id == m.jobcard_id)
            .ok_or_else(|| SimulationError::UnknownEntity {
                variation: variation.name.clone(),
                entity: "job card",
                id: m.jobcard_id.clone(),
            })?;
        if let Some(status) = m.new_status {
            card.status = status;
            if status == crate::types::JobCardStatus::Completed {
                card.completed_at = Some(ctx.taken_at);
            }
        }
        if let Some(priority) = m.new_priority {
            card.priority = priority;
        }
    }

    for m in &variation.trainset_modifications {
        let trainset = ctx
            .trainsets
            .iter_mut()
            .find(|t| t.id == m.trainset_id)
            .ok_or_else(|| SimulationError::UnknownEntity {
                variation: variation.name.clone(),
                entity: "trainset",
                id: m.trainset_id.clone(),
            })?;
        if let Some(status) = m.new_status {
            trainset.status = status;
        }
        if let Some(mileage) = m.new_mileage {
            trainset.current_mileage = mileage;
        }
        if let Some(ref location) = m.new_location {
            trainset.location = location.clone();
        }
    }

    Ok(())
}

/// Per-metric deltas of each variation against the base, plus the winner.
fn compare(base: &ScenarioOutcome, variations: &[ScenarioOutcome]) -> ScenarioComparison {
    let metric_rows = |m: &ScenarioMetrics| {
        [
            ("service_readiness", m.service_readiness),
            ("reliability", m.reliability),
            ("cost_efficiency", m.cost_efficiency),
            ("branding_exposure", m.branding_exposure),
            ("energy_efficiency", m.energy_efficiency),
            ("overall_score", m.overall_score),
        ]
    };

    let deltas = variations
        .iter()
        .map(|v| {
            let rows = metric_rows(&base.metrics)
                .iter()
                .zip(metric_rows(&v.metrics).iter())
                .map(|(&(name, base_value), &(_, var_value))| MetricDelta {
                    metric: name.to_string(),
                    base: base_value,
                    variation: var_value,
                    delta: var_value - base_value,
                })
                .collect();
            (v.name.clone(), rows)
        })
        .collect();

    let best = variations
        .iter()
        .max_by(|a, b| {
            a.metrics
                .overall_score
                .partial_cmp(&b.metrics.overall_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .filter(|v| v.metrics.overall_score > base.metrics.overall_score);

    match best {
        Some(winner) => ScenarioComparison {
            deltas,
            best_scenario: winner.name.clone(),
            expected_improvement: winner.metrics.overall_score - base.metrics.overall_score,
        },
        None => ScenarioComparison {
            deltas,
            best_scenario: base.name.clone(),
            expected_improvement: 0.0,
        },
    }
}

fn simulation_recommendations(
    base: &ScenarioOutcome,
    comparison: &ScenarioComparison,
) -> Vec<Recommendation> {
    let mut out = Vec::new();
    if comparison.best_scenario != base.name && comparison.expected_improvement > 0.0 {
        out.push(Recommendation {
            kind: RecommendationKind::BestScenario,
            message: format!(
                "Scenario '{}' improves the overall score by {:.1} points over the base plan",
                comparison.best_scenario, comparison.expected_improvement
            ),
            trainset_ids: Vec::new(),
            expected_improvement: Some(comparison.expected_improvement),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::fixtures::{make_context, make_trainset};
    use crate::types::{FitnessCertificate, FitnessModification, TrainsetModification};
    use chrono::Duration;

    fn ctx_with_certs(n: usize) -> Context {
        let trainsets = (0..n).map(|i| make_trainset(&format!("ts-{i:03}"))).collect();
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
    fn overlays_mutate_only_the_copy() {
        let original = ctx_with_certs(3);
        let mut copy = original.clone();
        let variation = ScenarioVariation {
            name: "expire-one".to_string(),
            description: String::new(),
            fitness_modifications: vec![FitnessModification {
                trainset_id: "ts-000".to_string(),
                new_expires_at: Some(original.taken_at - Duration::days(1)),
                new_status: None,
            }],
            jobcard_modifications: Vec::new(),
            trainset_modifications: vec![TrainsetModification {
                trainset_id: "ts-001".to_string(),
                new_status: None,
                new_mileage: Some(9_999.0),
                new_location: None,
            }],
        };
        apply_variation(&mut copy, &variation).unwrap();

        assert_ne!(copy.certificates[0].expires_at, original.certificates[0].expires_at);
        assert_eq!(copy.trainsets[1].current_mileage, 9_999.0);
        assert_eq!(original.trainsets[1].current_mileage, 1_000.0);
    }

    #[test]
    fn unknown_job_card_is_an_error() {
        let mut ctx = ctx_with_certs(2);
        let variation = ScenarioVariation {
            name: "bad".to_string(),
            description: String::new(),
            fitness_modifications: Vec::new(),
            jobcard_modifications: vec![crate::types::JobCardModification {
                jobcard_id: "missing".to_string(),
                new_status: Some(crate::types::JobCardStatus::Completed),
                new_priority: None,
            }],
            trainset_modifications: Vec::new(),
        };
        let err = apply_variation(&mut ctx, &variation).unwrap_err();
        assert!(matches!(err, SimulationError::UnknownEntity { .. }));
    }

    #[test]
    fn comparison_prefers_the_best_improving_variation() {
        let outcome = |name: &str, overall: f64| ScenarioOutcome {
            name: name.to_string(),
            metrics: ScenarioMetrics {
                overall_score: overall,
                ..ScenarioMetrics::default()
            },
            conflict_count: 0,
            ready_count: 0,
        };
        let base = outcome("base", 70.0);
        let variations = vec![outcome("a", 65.0), outcome("b", 80.0)];
        let comparison = compare(&base, &variations);
        assert_eq!(comparison.best_scenario, "b");
        assert!((comparison.expected_improvement - 10.0).abs() < 1e-9);
    }

    #[test]
    fn base_wins_when_no_variation_improves() {
        let outcome = |name: &str, overall: f64| ScenarioOutcome {
            name: name.to_string(),
            metrics: ScenarioMetrics {
                overall_score: overall,
                ..ScenarioMetrics::default()
            },
            conflict_count: 0,
            ready_count: 0,
        };
        let base = outcome("base", 70.0);
        let comparison = compare(&base, &[outcome("a", 60.0)]);
        assert_eq!(comparison.best_scenario, "base");
        assert_eq!(comparison.expected_improvement, 0.0);
        assert!(simulation_recommendations(&base, &comparison).is_empty());
    }
}
