//! Optimizer — NSGA-II multi-objective search over induction sets
//!
//! - `objectives`: per-trainset feature cache and the five objective scorers
//! - `nsga`: the evolutionary search itself
//! - `report`: operator-facing run reports
//! - `runner`: worker pool, run lifecycle, cancellation, events

pub mod nsga;
pub mod objectives;
pub mod report;
mod runner;

pub use runner::{OptimizeError, OptimizerPool};

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::store::Context;
use crate::types::{InductionPlan, OptimizationParameters, OptimizationReport};

use objectives::EvaluationCache;

/// Outcome of an inline (synchronous) optimization over a snapshot.
///
/// Used by the what-if simulator, which runs the search in the caller's
/// thread instead of the worker pool.
#[derive(Debug, Clone)]
pub struct SnapshotOptimization {
    pub best: Option<InductionPlan>,
    pub pareto_front: Vec<InductionPlan>,
    pub report: OptimizationReport,
}

/// Run the search synchronously over a context snapshot.
pub fn optimize_snapshot(
    ctx: &Context,
    params: &OptimizationParameters,
    deadline: Option<Instant>,
) -> Result<SnapshotOptimization, OptimizeError> {
    let cache = EvaluationCache::build(ctx);
    if cache.eligible.len() < params.min_trainsets {
        return Err(OptimizeError::NoEligibleTrainsets {
            eligible: cache.eligible.len(),
            required: params.min_trainsets,
        });
    }

    let started = Instant::now();
    let cancel = CancellationToken::new();
    let outcome = nsga::run_search(&cache, params, deadline, &cancel, |_| {});
    let run_report = report::build(&outcome, &cache, started.elapsed().as_millis() as u64);

    Ok(SnapshotOptimization {
        best: outcome.best.as_ref().map(|i| report::to_plan(i, &cache)),
        pareto_front: outcome
            .pareto_front
            .iter()
            .map(|i| report::to_plan(i, &cache))
            .collect(),
        report: run_report,
    })
}
