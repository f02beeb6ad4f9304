//! Optimization run lifecycle: worker pool, cancellation, timeouts, events
//!
//! Each submitted run belongs to exactly one worker. Runs queue on a
//! semaphore sized to the configured worker pool; the CPU-bound search runs
//! on a blocking thread and reports progress through the event bus. Readers
//! observe runs as snapshots from the registry; only the owning worker
//! mutates them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::bus::EventBus;
use crate::config::defaults::SNAPSHOT_TIMEOUT_SECS;
use crate::config::OptimizerConfig;
use crate::store::{FleetStore, StoreError};
use crate::types::{
    EventKind, OptimizationParameters, OptimizationRun, RunStatus, Shift,
};

use super::nsga::{self, StopReason};
use super::objectives::EvaluationCache;
use super::report;

/// Optimizer-facing errors
#[derive(Debug, thiserror::Error)]
pub enum OptimizeError {
    #[error("no eligible trainsets: {eligible} eligible, {required} required")]
    NoEligibleTrainsets { eligible: usize, required: usize },
    #[error("optimization run not found: {0}")]
    RunNotFound(String),
    #[error("snapshot acquisition timed out after {0:?}")]
    SnapshotTimeout(Duration),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal evaluation error: {0}")]
    Internal(String),
}

/// Worker pool executing optimization runs.
pub struct OptimizerPool {
    store: Arc<dyn FleetStore>,
    bus: Arc<EventBus>,
    config: OptimizerConfig,
    runs: Arc<DashMap<String, OptimizationRun>>,
    cancel_tokens: Arc<DashMap<String, CancellationToken>>,
    workers: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl OptimizerPool {
    pub fn new(store: Arc<dyn FleetStore>, bus: Arc<EventBus>, config: OptimizerConfig) -> Self {
        let workers = config.effective_workers();
        info!(workers, "Optimizer pool initialized");
        Self {
            store,
            bus,
            config,
            runs: Arc::new(DashMap::new()),
            cancel_tokens: Arc::new(DashMap::new()),
            workers: Arc::new(Semaphore::new(workers)),
            tracker: TaskTracker::new(),
        }
    }

    /// Effective parameters for a request: caller preferences over the
    /// configured defaults.
    pub fn parameters_from(&self, overrides: Option<OptimizationParameters>) -> OptimizationParameters {
        overrides.unwrap_or_else(|| OptimizationParameters {
            population_size: self.config.population_size,
            max_generations: self.config.max_generations,
            mutation_rate: self.config.mutation_rate,
            crossover_rate: self.config.crossover_rate,
            elitism: self.config.elitism,
            weights: self.config.objective_weights,
            ..OptimizationParameters::default()
        })
    }

    /// Submit a run for the given planning (date, shift). Returns the run id
    /// immediately; the search executes asynchronously.
    pub async fn submit(
        &self,
        date: NaiveDate,
        shift: Shift,
        params: OptimizationParameters,
    ) -> Result<String, OptimizeError> {
        self.submit_with_hint(date, shift, params, None).await
    }

    /// Submit a run restricted to a caller-supplied candidate pool. Hinted
    /// trainsets that fail eligibility are still excluded.
    pub async fn submit_with_hint(
        &self,
        date: NaiveDate,
        shift: Shift,
        params: OptimizationParameters,
        trainsets_hint: Option<Vec<String>>,
    ) -> Result<String, OptimizeError> {
        // Snapshot under the configured acquisition timeout
        let store = self.store.clone();
        let snapshot = tokio::time::timeout(
            Duration::from_secs(SNAPSHOT_TIMEOUT_SECS),
            tokio::task::spawn_blocking(move || store.snapshot(date, shift)),
        )
        .await
        .map_err(|_| OptimizeError::SnapshotTimeout(Duration::from_secs(SNAPSHOT_TIMEOUT_SECS)))?
        .map_err(|e| OptimizeError::Internal(e.to_string()))??;

        let mut cache = EvaluationCache::build(&snapshot);
        if let Some(hint) = trainsets_hint {
            let allowed: std::collections::HashSet<String> = hint.into_iter().collect();
            let features = &cache.features;
            let filtered: Vec<usize> = cache
                .eligible
                .iter()
                .copied()
                .filter(|&i| allowed.contains(&features[i].id))
                .collect();
            cache.eligible = filtered;
        }
        if cache.eligible.len() < params.min_trainsets {
            return Err(OptimizeError::NoEligibleTrainsets {
                eligible: cache.eligible.len(),
                required: params.min_trainsets,
            });
        }

        let run_id = Uuid::new_v4().to_string();
        let run = OptimizationRun::queued(run_id.clone(), params.clone());
        self.runs.insert(run_id.clone(), run.clone());
        let _ = self.store.put_run(&run);

        let cancel = CancellationToken::new();
        self.cancel_tokens.insert(run_id.clone(), cancel.clone());

        let worker = RunWorker {
            store: self.store.clone(),
            bus: self.bus.clone(),
            runs: self.runs.clone(),
            cancel_tokens: self.cancel_tokens.clone(),
            workers: self.workers.clone(),
            hard_timeout: Duration::from_secs(self.config.run_hard_timeout_secs),
        };
        self.tracker
            .spawn(worker.execute(run_id.clone(), params, cache, cancel));

        Ok(run_id)
    }

    /// Snapshot of a run, preferring the live registry over the store.
    pub fn get(&self, run_id: &str) -> Result<OptimizationRun, OptimizeError> {
        if let Some(run) = self.runs.get(run_id) {
            return Ok(run.value().clone());
        }
        self.store
            .get_run(run_id)
            .map_err(|_| OptimizeError::RunNotFound(run_id.to_string()))
    }

    /// Request cancellation. Always acknowledged: returns the run's current
    /// status even when it already reached a terminal state.
    pub fn cancel(&self, run_id: &str) -> Result<RunStatus, OptimizeError> {
        let run = self.get(run_id)?;
        if let Some(token) = self.cancel_tokens.get(run_id) {
            token.cancel();
        }
        info!(run_id, status = %run.status, "Cancellation requested");
        Ok(run.status)
    }

    /// Cancel everything and wait for in-flight generations to wind down.
    pub async fn shutdown(&self, grace: Duration) {
        for entry in self.cancel_tokens.iter() {
            entry.value().cancel();
        }
        self.tracker.close();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            warn!("Optimizer pool shutdown grace period elapsed with work still running");
        }
    }
}

/// State threaded into one run's worker task.
struct RunWorker {
    store: Arc<dyn FleetStore>,
    bus: Arc<EventBus>,
    runs: Arc<DashMap<String, OptimizationRun>>,
    cancel_tokens: Arc<DashMap<String, CancellationToken>>,
    workers: Arc<Semaphore>,
    hard_timeout: Duration,
}

impl RunWorker {
    async fn execute(
        self,
        run_id: String,
        params: OptimizationParameters,
        cache: EvaluationCache,
        cancel: CancellationToken,
    ) {
        // Wait for a worker slot; cancellation while queued is honored
        let _permit = match self.workers.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return, // pool shut down
        };
        if cancel.is_cancelled() {
            self.finish(&run_id, RunStatus::Cancelled, None);
            return;
        }

        self.update_run(&run_id, |run| {
            run.status = RunStatus::Running;
            run.started_at = Some(Utc::now());
        });
        self.bus
            .publish(EventKind::OptimizationStarted, json!({ "run_id": run_id }));

        let started = Instant::now();
        let deadline = started + self.hard_timeout;

        let search = {
            let runs = self.runs.clone();
            let bus = self.bus.clone();
            let run_id = run_id.clone();
            let cancel = cancel.clone();
            let cache_for_search = cache.clone();
            let params = params.clone();
            tokio::task::spawn_blocking(move || {
                let outcome = nsga::run_search(
                    &cache_for_search,
                    &params,
                    Some(deadline),
                    &cancel,
                    |snapshot| {
                        let progress =
                            snapshot.generation as f64 / snapshot.max_generations.max(1) as f64;
                        if let Some(mut run) = runs.get_mut(&run_id) {
                            run.progress = progress;
                            run.pareto_front = snapshot
                                .pareto_front
                                .iter()
                                .map(|i| report::to_plan(i, &cache_for_search))
                                .collect();
                            run.best_solution = snapshot
                                .best
                                .as_ref()
                                .map(|i| report::to_plan(i, &cache_for_search));
                        }
                        bus.publish(
                            EventKind::OptimizationIteration,
                            json!({
                                "run_id": run_id,
                                "generation": snapshot.generation,
                                "best_fitness": snapshot.stats.best_fitness,
                                "pareto_front_size": snapshot.stats.pareto_front_size,
                            }),
                        );
                        bus.publish(
                            EventKind::OptimizationProgress,
                            json!({ "run_id": run_id, "progress": progress }),
                        );
                    },
                );
                let report = report::build(&outcome, &cache_for_search, started.elapsed().as_millis() as u64);
                (outcome, report)
            })
            .await
        };

        match search {
            Ok((outcome, run_report)) => {
                let status = match outcome.stop {
                    StopReason::Completed => RunStatus::Completed,
                    StopReason::Cancelled => RunStatus::Cancelled,
                    StopReason::TimedOut => RunStatus::TimedOut,
                };
                let pareto = outcome
                    .pareto_front
                    .iter()
                    .map(|i| report::to_plan(i, &cache))
                    .collect::<Vec<_>>();
                let best = outcome.best.as_ref().map(|i| report::to_plan(i, &cache));

                self.update_run(&run_id, |run| {
                    run.status = status;
                    run.finished_at = Some(Utc::now());
                    if status == RunStatus::Completed {
                        run.progress = 1.0;
                    }
                    run.pareto_front = pareto.clone();
                    run.best_solution = best.clone();
                    run.report = Some(run_report.clone());
                    if status == RunStatus::TimedOut {
                        run.error = Some("run hard-budget exceeded".to_string());
                    }
                });

                let (topic, detail) = match status {
                    RunStatus::Cancelled => (
                        EventKind::OptimizationCancelled,
                        json!({
                            "run_id": run_id,
                            "generations_completed": outcome.generations_completed,
                        }),
                    ),
                    RunStatus::TimedOut => (
                        EventKind::OptimizationFailed,
                        json!({ "run_id": run_id, "error": "run hard-budget exceeded" }),
                    ),
                    _ => (
                        EventKind::OptimizationCompleted,
                        json!({
                            "run_id": run_id,
                            "best_fitness": outcome.stats.best_fitness,
                            "pareto_front_size": outcome.stats.pareto_front_size,
                            "generations": outcome.generations_completed,
                        }),
                    ),
                };
                self.bus.publish(topic, detail);
                info!(
                    run_id,
                    status = %status,
                    generations = outcome.generations_completed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Optimization run finished"
                );
            }
            Err(e) => {
                error!(run_id, error = %e, "Optimization worker panicked");
                self.update_run(&run_id, |run| {
                    run.status = RunStatus::Failed;
                    run.finished_at = Some(Utc::now());
                    run.error = Some(e.to_string());
                });
                self.bus.publish(
                    EventKind::OptimizationFailed,
                    json!({ "run_id": run_id, "error": e.to_string() }),
                );
            }
        }

        self.persist(&run_id);
        self.cancel_tokens.remove(&run_id);
    }

    fn update_run(&self, run_id: &str, mutate: impl FnOnce(&mut OptimizationRun)) {
        if let Some(mut run) = self.runs.get_mut(run_id) {
            mutate(&mut run);
        }
    }

    fn finish(&self, run_id: &str, status: RunStatus, error: Option<String>) {
        self.update_run(run_id, |run| {
            run.status = status;
            run.finished_at = Some(Utc::now());
            run.error = error;
        });
        self.persist(run_id);
        self.cancel_tokens.remove(run_id);
    }

    fn persist(&self, run_id: &str) {
        if let Some(run) = self.runs.get(run_id) {
            if let Err(e) = self.store.put_run(run.value()) {
                warn!(run_id, error = %e, "Failed to persist optimization run");
            }
        }
    }
}
