//! API route definitions
//!
//! Command surface for the induction-planning core:
//! - POST /api/v1/decision            - generate an induction decision
//! - GET  /api/v1/decision/history    - recent decision audits
//! - POST /api/v1/optimize            - submit an optimization run (async)
//! - GET  /api/v1/optimize/runs/:id   - observe a run
//! - POST /api/v1/optimize/runs/:id/cancel
//! - POST /api/v1/what-if             - run a what-if simulation
//! - GET  /api/v1/what-if/:id         - fetch a memoized simulation (json|csv)
//! - POST /api/v1/status-sweep        - force an immediate status sweep
//! - GET  /api/v1/subscribe           - streaming event subscription (ws)
//! - GET  /api/v1/health, /status, /config, /subscriptions

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{self, ApiState};
use super::ws;

/// Create all API routes for the command surface.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/status", get(handlers::get_status))
        .route("/config", get(handlers::get_config))
        // Decisions
        .route("/decision", post(handlers::generate_decision))
        .route("/decision/history", get(handlers::get_decision_history))
        // Optimization
        .route("/optimize", post(handlers::optimize))
        .route("/optimize/runs/:id", get(handlers::get_run))
        .route("/optimize/runs/:id/cancel", post(handlers::cancel_run))
        // What-if
        .route("/what-if", post(handlers::run_what_if))
        .route("/what-if/:id", get(handlers::get_simulation))
        // Status loop
        .route("/status-sweep", post(handlers::force_status_sweep))
        // Event fan-out
        .route("/subscribe", get(ws::subscribe))
        .route("/subscriptions", get(handlers::get_subscriptions))
        .with_state(state)
}

/// Assemble the full application router.
pub fn create_app(state: ApiState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::bus::EventBus;
    use crate::clock::SystemClock;
    use crate::config::{BusConfig, DepotInfo, EngineConfig, OptimizerConfig, StatusLoopConfig};
    use crate::engine::DecisionEngine;
    use crate::optimizer::OptimizerPool;
    use crate::simulator::WhatIfSimulator;
    use crate::status_loop::StatusLoop;
    use crate::store::MemoryStore;

    fn create_test_state() -> ApiState {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(EventBus::new(&BusConfig::default()));
        let engine = DecisionEngine::new(EngineConfig::default());
        ApiState {
            store: store.clone(),
            engine: engine.clone(),
            optimizer: Arc::new(OptimizerPool::new(
                store.clone(),
                bus.clone(),
                OptimizerConfig::default(),
            )),
            simulator: Arc::new(WhatIfSimulator::new(
                store.clone(),
                engine,
                OptimizerConfig::default(),
            )),
            status_loop: Arc::new(StatusLoop::new(
                store.clone(),
                bus.clone(),
                Arc::new(SystemClock),
                StatusLoopConfig::default(),
                DepotInfo::default(),
            )),
            bus,
            started_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_api_routes_health() {
        let app = api_routes(create_test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_routes_status() {
        let app = api_routes(create_test_state());
        let response = app
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_decision_requires_valid_shift() {
        let app = api_routes(create_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/decision")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"date": "2026-02-01", "shift": "BOGUS"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_run_is_not_found() {
        let app = api_routes(create_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/optimize/runs/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
