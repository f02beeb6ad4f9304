//! Optimization run reporting
//!
//! Converts the raw search outcome into the operator-facing report: top
//! solutions, population statistics, distinct constraint violations, and
//! natural-language recommendations derived from objective gaps.

use std::collections::BTreeSet;

use crate::types::{InductionPlan, ObjectiveScores, OptimizationReport};

use super::nsga::{Individual, SearchOutcome};
use super::objectives::EvaluationCache;

/// Objective level below which a recommendation is emitted.
const OBJECTIVE_GAP_THRESHOLD: f64 = 80.0;

/// Convert an individual into a wire-level induction plan.
pub fn to_plan(individual: &Individual, cache: &EvaluationCache) -> InductionPlan {
    InductionPlan {
        subset: cache.ids_for(&individual.subset),
        objectives: individual.objectives,
        fitness: individual.fitness,
        constraint_score: individual.constraint_score,
        violations: individual.violations.clone(),
    }
}

/// Build the performance report for a finished (or interrupted) search.
pub fn build(outcome: &SearchOutcome, cache: &EvaluationCache, elapsed_ms: u64) -> OptimizationReport {
    let mut by_fitness: Vec<&Individual> = outcome.population.iter().collect();
    by_fitness.sort_by(|a, b| {
        b.fitness
            .partial_cmp(&a.fitness)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let top_solutions: Vec<InductionPlan> = by_fitness
        .iter()
        .take(5)
        .map(|i| to_plan(i, cache))
        .collect();

    let constraint_violations: Vec<String> = outcome
        .population
        .iter()
        .flat_map(|i| i.violations.iter().cloned())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect();

    let recommendations = outcome
        .best
        .as_ref()
        .map(|best| objective_recommendations(&best.objectives))
        .unwrap_or_default();

    OptimizationReport {
        top_solutions,
        population: outcome.stats.clone(),
        constraint_violations,
        recommendations,
        generations_completed: outcome.generations_completed,
        elapsed_ms,
    }
}

/// Natural-language guidance for each objective still below target.
fn objective_recommendations(objectives: &ObjectiveScores) -> Vec<String> {
    let mut out = Vec::new();
    if objectives.service_readiness < OBJECTIVE_GAP_THRESHOLD {
        out.push(
            "Service readiness below target: renew certificates and close blocking work orders"
                .to_string(),
        );
    }
    if objectives.reliability < OBJECTIVE_GAP_THRESHOLD {
        out.push(
            "Reliability below target: prefer newer trainsets and reduce open work-order backlog"
                .to_string(),
        );
    }
    if objectives.cost_efficiency < OBJECTIVE_GAP_THRESHOLD {
        out.push(
            "Cost efficiency below target: restable trainsets nearer the depot exit and defer units with imminent maintenance"
                .to_string(),
        );
    }
    if objectives.branding_exposure < OBJECTIVE_GAP_THRESHOLD {
        out.push(
            "Branding exposure below target: include more trainsets carrying active campaigns"
                .to_string(),
        );
    }
    if objectives.energy_efficiency < OBJECTIVE_GAP_THRESHOLD {
        out.push(
            "Energy efficiency below target: balance mileage across the selection".to_string(),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_objectives_need_no_recommendations() {
        let objectives = ObjectiveScores {
            service_readiness: 95.0,
            reliability: 88.0,
            cost_efficiency: 90.0,
            branding_exposure: 100.0,
            energy_efficiency: 85.0,
        };
        assert!(objective_recommendations(&objectives).is_empty());
    }

    #[test]
    fn each_gap_yields_guidance() {
        let objectives = ObjectiveScores {
            service_readiness: 95.0,
            reliability: 60.0,
            cost_efficiency: 90.0,
            branding_exposure: 40.0,
            energy_efficiency: 85.0,
        };
        let recs = objective_recommendations(&objectives);
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().any(|r| r.contains("newer trainsets")));
        assert!(recs.iter().any(|r| r.contains("campaigns")));
    }
}
