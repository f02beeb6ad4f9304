//! Command-surface handlers
//!
//! Thin translation layer: validate input, call the owning component, map
//! typed errors onto the response envelope. No planning logic lives here.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::bus::EventBus;
use crate::config::defaults::SNAPSHOT_TIMEOUT_SECS;
use crate::engine::{DecisionEngine, DecisionError};
use crate::optimizer::{OptimizeError, OptimizerPool};
use crate::simulator::{SimulationError, WhatIfSimulator};
use crate::status_loop::StatusLoop;
use crate::store::{FleetStore, StoreError};
use crate::types::{
    EventKind, InductionDecision, OptimizationParameters, ScenarioBase, ScenarioVariation,
    Schedule, ScheduleEntry, Shift,
};

use super::envelope::{ApiErrorResponse, ApiResponse};

// ============================================================================
// Shared state
// ============================================================================

/// State threaded through every handler.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn FleetStore>,
    pub engine: DecisionEngine,
    pub optimizer: Arc<OptimizerPool>,
    pub simulator: Arc<WhatIfSimulator>,
    pub status_loop: Arc<StatusLoop>,
    pub bus: Arc<EventBus>,
    pub started_at: DateTime<Utc>,
}

// ============================================================================
// Error mapping
// ============================================================================

fn store_error(e: &StoreError) -> Response {
    match e {
        StoreError::NotFound { .. } => ApiErrorResponse::not_found(e.to_string()),
        StoreError::Conflict { .. } => ApiErrorResponse::conflict(e.to_string()),
        StoreError::Unavailable(_) => ApiErrorResponse::service_unavailable(e.to_string()),
        StoreError::Serialization(_) => ApiErrorResponse::internal(e.to_string()),
    }
}

fn decision_error(e: &DecisionError) -> Response {
    match e {
        DecisionError::ContextEmpty => {
            ApiErrorResponse::unprocessable("CONTEXT_EMPTY", e.to_string())
        }
        DecisionError::Store(inner) => store_error(inner),
    }
}

fn optimize_error(e: &OptimizeError) -> Response {
    match e {
        OptimizeError::NoEligibleTrainsets { .. } => {
            ApiErrorResponse::unprocessable("NO_ELIGIBLE_TRAINSETS", e.to_string())
        }
        OptimizeError::RunNotFound(_) => ApiErrorResponse::not_found(e.to_string()),
        OptimizeError::SnapshotTimeout(_) => ApiErrorResponse::service_unavailable(e.to_string()),
        OptimizeError::Store(inner) => store_error(inner),
        OptimizeError::Internal(_) => ApiErrorResponse::internal(e.to_string()),
    }
}

// ============================================================================
// Health & status
// ============================================================================

pub async fn get_health(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(json!({
        "status": "ok",
        "backend": state.store.backend_name(),
    }))
}

pub async fn get_status(State(state): State<ApiState>) -> Response {
    let loop_stats = state.status_loop.stats();
    ApiResponse::ok(json!({
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
        "store_backend": state.store.backend_name(),
        "sweeps_completed": loop_stats.sweeps_completed.load(std::sync::atomic::Ordering::Relaxed),
        "transitions_applied": loop_stats.transitions_applied.load(std::sync::atomic::Ordering::Relaxed),
        "transitions_refused": loop_stats.transitions_refused.load(std::sync::atomic::Ordering::Relaxed),
        "subscribers": state.bus.subscriber_count(),
        "event_seq": state.bus.current_seq(),
    }))
}

pub async fn get_config() -> Response {
    ApiResponse::ok(crate::config::get().clone())
}

// ============================================================================
// Decisions
// ============================================================================

/// Per-request induction size overrides.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PlanningConstraints {
    pub min_trainsets: Option<usize>,
    pub max_trainsets: Option<usize>,
}

impl PlanningConstraints {
    fn validate(&self) -> Result<(), String> {
        if let (Some(min), Some(max)) = (self.min_trainsets, self.max_trainsets) {
            if min > max {
                return Err(format!("min_trainsets {min} exceeds max_trainsets {max}"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateDecisionRequest {
    /// Planning date, `YYYY-MM-DD`
    pub date: String,
    /// MORNING | AFTERNOON | EVENING | NIGHT
    pub shift: String,
    /// Optional induction size overrides for this decision only
    pub constraints: Option<PlanningConstraints>,
    /// Optional idempotency key; a retried request returns the prior result
    pub idempotency_key: Option<String>,
}

pub async fn generate_decision(
    State(state): State<ApiState>,
    Json(req): Json<GenerateDecisionRequest>,
) -> Response {
    let Ok(date) = NaiveDate::parse_from_str(&req.date, "%Y-%m-%d") else {
        return ApiErrorResponse::bad_request(format!("invalid date '{}'", req.date));
    };
    let Some(shift) = Shift::parse(&req.shift) else {
        return ApiErrorResponse::bad_request(format!("invalid shift '{}'", req.shift));
    };
    let constraints = req.constraints.unwrap_or_default();
    if let Err(issue) = constraints.validate() {
        return ApiErrorResponse::bad_request(issue);
    }

    if let Some(ref key) = req.idempotency_key {
        match state.store.claim_idempotency_key(&format!("decision:{key}")) {
            Ok(true) => {}
            Ok(false) => {
                // Replayed request: serve the latest matching audit
                return match latest_decision_for(&state, date, shift) {
                    Some(prior) => ApiResponse::ok(prior),
                    None => ApiErrorResponse::conflict(
                        "idempotency key already used but no prior decision found",
                    ),
                };
            }
            Err(e) => return store_error(&e),
        }
    }

    let store = state.store.clone();
    let snapshot = tokio::time::timeout(
        Duration::from_secs(SNAPSHOT_TIMEOUT_SECS),
        tokio::task::spawn_blocking(move || store.snapshot(date, shift)),
    )
    .await;
    let ctx = match snapshot {
        Ok(Ok(Ok(ctx))) => ctx,
        Ok(Ok(Err(e))) => return store_error(&e),
        Ok(Err(join)) => return ApiErrorResponse::internal(join.to_string()),
        Err(_) => return ApiErrorResponse::service_unavailable("snapshot acquisition timed out"),
    };

    let engine = state
        .engine
        .with_constraints(constraints.min_trainsets, constraints.max_trainsets);
    let decision = match engine.generate(&ctx) {
        Ok(d) => d,
        Err(e) => return decision_error(&e),
    };

    if let Err(e) = state.store.append_decision(&decision) {
        error!(error = %e, "Failed to persist induction decision");
        return store_error(&e);
    }
    let schedule = schedule_from(&decision);
    if let Err(e) = state.store.append_schedule(&schedule) {
        error!(error = %e, "Failed to persist schedule");
        return store_error(&e);
    }

    state.bus.publish(
        EventKind::DecisionGenerated,
        json!({
            "decision_id": decision.id,
            "date": decision.date,
            "shift": decision.shift,
            "confidence": decision.confidence,
            "conflicts": decision.conflicts.len(),
        }),
    );
    state.bus.publish(
        EventKind::ScheduleUpdated,
        json!({ "schedule_id": schedule.id, "date": schedule.date, "shift": schedule.shift }),
    );

    info!(decision_id = %decision.id, "Decision generated via command surface");
    ApiResponse::ok(decision)
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    20
}

pub async fn get_decision_history(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    match state.store.list_decisions(query.limit.min(200)) {
        Ok(decisions) => ApiResponse::ok(decisions),
        Err(e) => store_error(&e),
    }
}

fn latest_decision_for(state: &ApiState, date: NaiveDate, shift: Shift) -> Option<InductionDecision> {
    state
        .store
        .list_decisions(50)
        .ok()?
        .into_iter()
        .find(|d| d.date == date && d.shift == shift)
}

/// Materialize a shift schedule from the ranked list.
fn schedule_from(decision: &InductionDecision) -> Schedule {
    Schedule {
        id: Uuid::new_v4().to_string(),
        date: decision.date,
        shift: decision.shift,
        entries: decision
            .ranked_list
            .iter()
            .map(|row| ScheduleEntry {
                trainset_id: row.trainset_id.clone(),
                decision: row.decision,
                rank: row.rank,
                route: None,
                start_time: None,
                end_time: None,
                reasons: vec![format!(
                    "{} (composite {:.1})",
                    row.readiness, row.composite_score
                )],
                conflicts: row.warnings.clone(),
            })
            .collect(),
        generated_at: decision.generated_at,
    }
}

// ============================================================================
// Optimization
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    /// Planning date, `YYYY-MM-DD`; defaults to today
    pub date: Option<String>,
    /// Defaults to NIGHT
    pub shift: Option<String>,
    /// Optional candidate pool; eligibility still applies on top
    pub trainsets: Option<Vec<String>>,
    pub constraints: Option<PlanningConstraints>,
    pub preferences: Option<OptimizationParameters>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OptimizeAccepted {
    pub run_id: String,
}

pub async fn optimize(
    State(state): State<ApiState>,
    Json(req): Json<OptimizeRequest>,
) -> Response {
    let date = match req.date {
        Some(ref raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => return ApiErrorResponse::bad_request(format!("invalid date '{raw}'")),
        },
        None => Utc::now().date_naive(),
    };
    let shift = match req.shift {
        Some(ref raw) => match Shift::parse(raw) {
            Some(s) => s,
            None => return ApiErrorResponse::bad_request(format!("invalid shift '{raw}'")),
        },
        None => Shift::Night,
    };

    if let Some(ref key) = req.idempotency_key {
        match state.store.claim_idempotency_key(&format!("optimize:{key}")) {
            Ok(true) => {}
            Ok(false) => {
                return ApiErrorResponse::conflict("idempotency key already used for an optimize request")
            }
            Err(e) => return store_error(&e),
        }
    }

    let mut params = state.optimizer.parameters_from(req.preferences);
    if let Some(constraints) = req.constraints {
        if let Err(issue) = constraints.validate() {
            return ApiErrorResponse::bad_request(issue);
        }
        if let Some(min) = constraints.min_trainsets {
            params.min_trainsets = min;
        }
        if let Some(max) = constraints.max_trainsets {
            params.max_trainsets = max;
        }
    }
    if let Err(issue) = validate_parameters(&params) {
        return ApiErrorResponse::bad_request(issue);
    }

    match state
        .optimizer
        .submit_with_hint(date, shift, params, req.trainsets)
        .await
    {
        Ok(run_id) => ApiResponse::accepted(OptimizeAccepted { run_id }),
        Err(e) => optimize_error(&e),
    }
}

fn validate_parameters(params: &OptimizationParameters) -> Result<(), String> {
    if params.population_size < 2 {
        return Err("population_size must be at least 2".to_string());
    }
    if params.max_generations == 0 {
        return Err("max_generations must be positive".to_string());
    }
    if params.min_trainsets > params.max_trainsets {
        return Err(format!(
            "min_trainsets {} exceeds max_trainsets {}",
            params.min_trainsets, params.max_trainsets
        ));
    }
    if !(0.0..=1.0).contains(&params.mutation_rate) || !(0.0..=1.0).contains(&params.crossover_rate)
    {
        return Err("mutation_rate and crossover_rate must be within [0, 1]".to_string());
    }
    Ok(())
}

pub async fn get_run(State(state): State<ApiState>, Path(run_id): Path<String>) -> Response {
    match state.optimizer.get(&run_id) {
        Ok(run) => ApiResponse::ok(run),
        Err(e) => optimize_error(&e),
    }
}

pub async fn cancel_run(State(state): State<ApiState>, Path(run_id): Path<String>) -> Response {
    match state.optimizer.cancel(&run_id) {
        Ok(status) => ApiResponse::ok(json!({ "run_id": run_id, "status": status })),
        Err(e) => optimize_error(&e),
    }
}

// ============================================================================
// What-if
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct WhatIfRequest {
    pub base: ScenarioBase,
    #[serde(default)]
    pub variations: Vec<ScenarioVariation>,
}

pub async fn run_what_if(
    State(state): State<ApiState>,
    Json(req): Json<WhatIfRequest>,
) -> Response {
    if req.variations.len() > 20 {
        return ApiErrorResponse::bad_request("at most 20 variations per simulation");
    }
    let mut names = std::collections::HashSet::new();
    for variation in &req.variations {
        if variation.name.trim().is_empty() {
            return ApiErrorResponse::bad_request("variation names must be non-empty");
        }
        if !names.insert(variation.name.clone()) {
            return ApiErrorResponse::bad_request(format!(
                "duplicate variation name '{}'",
                variation.name
            ));
        }
    }

    // The simulator runs the optimizer inline; keep it off the async workers
    let simulator = state.simulator.clone();
    let result = tokio::task::spawn_blocking(move || simulator.run(&req.base, &req.variations)).await;
    match result {
        Ok(Ok(simulation)) => ApiResponse::ok(simulation),
        Ok(Err(e @ SimulationError::UnknownEntity { .. })) => {
            ApiErrorResponse::bad_request(e.to_string())
        }
        Ok(Err(SimulationError::Decision(e))) => decision_error(&e),
        Ok(Err(SimulationError::Store(e))) => store_error(&e),
        Err(join) => ApiErrorResponse::internal(join.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct SimulationQuery {
    pub format: Option<String>,
}

pub async fn get_simulation(
    State(state): State<ApiState>,
    Path(simulation_id): Path<String>,
    Query(query): Query<SimulationQuery>,
) -> Response {
    let Some(result) = state.simulator.get(&simulation_id) else {
        return ApiErrorResponse::not_found(format!("simulation {simulation_id} not found"));
    };
    match query.format.as_deref() {
        Some("csv") => {
            use axum::response::IntoResponse;
            (
                [(axum::http::header::CONTENT_TYPE, "text/csv")],
                result.to_csv(),
            )
                .into_response()
        }
        None | Some("json") => ApiResponse::ok(result),
        Some(other) => ApiErrorResponse::bad_request(format!("unknown format '{other}'")),
    }
}

// ============================================================================
// Status sweep & subscriptions
// ============================================================================

pub async fn force_status_sweep(State(state): State<ApiState>) -> Response {
    let status_loop = state.status_loop.clone();
    match tokio::task::spawn_blocking(move || status_loop.sweep()).await {
        Ok(report) => ApiResponse::ok(report),
        Err(join) => ApiErrorResponse::internal(join.to_string()),
    }
}

pub async fn get_subscriptions(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.bus.stats())
}
