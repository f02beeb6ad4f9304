//! Command-surface regression over the seeded demo fleet
//!
//! Drives the full axum app with `tower::ServiceExt::oneshot`, the same way
//! a dashboard client would, and checks envelope shapes end to end.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use railmind::api::{create_app, ApiState};
use railmind::bus::EventBus;
use railmind::clock::SystemClock;
use railmind::config::{BusConfig, DepotInfo, EngineConfig, OptimizerConfig, StatusLoopConfig};
use railmind::demo;
use railmind::engine::DecisionEngine;
use railmind::optimizer::OptimizerPool;
use railmind::simulator::WhatIfSimulator;
use railmind::status_loop::StatusLoop;
use railmind::store::MemoryStore;

fn seeded_state() -> ApiState {
    let store = Arc::new(MemoryStore::new());
    demo::seed_fleet(store.as_ref()).unwrap();

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

async fn post_json(app: &axum::Router, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

#[tokio::test]
async fn decision_round_trip() {
    let app = create_app(seeded_state());

    let (status, body) = post_json(
        &app,
        "/api/v1/decision",
        serde_json::json!({"date": "2026-02-01", "shift": "NIGHT"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ranked = body["data"]["ranked_list"].as_array().unwrap();
    assert_eq!(ranked.len(), demo::DEMO_FLEET_SIZE);
    assert!(body["data"]["confidence"].as_f64().unwrap() <= 100.0);
    assert_eq!(body["data"]["inputs_hash"].as_str().unwrap().len(), 32);

    // The decision lands in history
    let (status, body) = get_json(&app, "/api/v1/decision/history?limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn decision_idempotency_key_replays() {
    let app = create_app(seeded_state());
    let req = serde_json::json!({
        "date": "2026-02-01",
        "shift": "NIGHT",
        "idempotency_key": "ops-console-42"
    });

    let (status, first) = post_json(&app, "/api/v1/decision", req.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = post_json(&app, "/api/v1/decision", req).await;
    assert_eq!(status, StatusCode::OK);
    // The replay serves the previously persisted decision
    assert_eq!(first["data"]["id"], second["data"]["id"]);
}

#[tokio::test]
async fn optimize_run_lifecycle() {
    let app = create_app(seeded_state());

    let (status, body) = post_json(
        &app,
        "/api/v1/optimize",
        serde_json::json!({
            "date": "2026-02-01",
            "shift": "NIGHT",
            "preferences": {
                "population_size": 16,
                "max_generations": 8,
                "min_trainsets": 10,
                "max_trainsets": 20,
                "seed": 5
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let run_id = body["data"]["run_id"].as_str().unwrap().to_string();

    // Poll until terminal
    let deadline = Instant::now() + Duration::from_secs(30);
    let run = loop {
        let (status, body) = get_json(&app, &format!("/api/v1/optimize/runs/{run_id}")).await;
        assert_eq!(status, StatusCode::OK);
        let run_status = body["data"]["status"].as_str().unwrap().to_string();
        if ["COMPLETED", "FAILED", "CANCELLED", "TIMED_OUT"].contains(&run_status.as_str()) {
            break body;
        }
        assert!(Instant::now() < deadline, "run did not finish in time");
        tokio::time::sleep(Duration::from_millis(25)).await;
    };

    assert_eq!(run["data"]["status"], "COMPLETED");
    let subset = run["data"]["best_solution"]["subset"].as_array().unwrap();
    assert!(subset.len() >= 10 && subset.len() <= 20);
    assert!(!run["data"]["pareto_front"].as_array().unwrap().is_empty());

    // Cancel after completion is still acknowledged
    let (status, body) =
        post_json(&app, &format!("/api/v1/optimize/runs/{run_id}/cancel"), serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "COMPLETED");
}

#[tokio::test]
async fn trainset_hint_restricts_the_candidate_pool() {
    let app = create_app(seeded_state());

    // Hinting fewer units than the service minimum cannot be satisfied
    let (status, body) = post_json(
        &app,
        "/api/v1/optimize",
        serde_json::json!({
            "date": "2026-02-01",
            "shift": "NIGHT",
            "trainsets": ["ts-001", "ts-002", "ts-003"],
            "preferences": {"population_size": 10, "max_generations": 5}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "NO_ELIGIBLE_TRAINSETS");
}

#[tokio::test]
async fn what_if_round_trip_with_csv_export() {
    let app = create_app(seeded_state());

    let (status, body) = post_json(
        &app,
        "/api/v1/what-if",
        serde_json::json!({
            "base": {
                "date": "2026-02-01",
                "shift": "NIGHT",
                "optimizer_preferences": {
                    "population_size": 12,
                    "max_generations": 6,
                    "min_trainsets": 10,
                    "max_trainsets": 20,
                    "seed": 9
                }
            },
            "variations": [{
                "name": "clear-traction-fault",
                "description": "Assume jc-001 closes before induction",
                "jobcard_modifications": [
                    {"jobcard_id": "jc-001", "new_status": "COMPLETED"}
                ]
            }]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let simulation_id = body["data"]["simulation_id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["variations"].as_array().unwrap().len(), 1);

    // JSON fetch
    let (status, _body) = get_json(&app, &format!("/api/v1/what-if/{simulation_id}")).await;
    assert_eq!(status, StatusCode::OK);

    // CSV fetch
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/what-if/{simulation_id}?format=csv"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(csv.starts_with("scenario,"));
    assert!(csv.contains("clear-traction-fault"));
}

#[tokio::test]
async fn status_sweep_and_observability_endpoints() {
    let app = create_app(seeded_state());

    let (status, body) = post_json(&app, "/api/v1/status-sweep", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"]["examined"].as_u64().unwrap() as usize,
        demo::DEMO_FLEET_SIZE
    );
    // The demo fleet ships one expired certificate, so the sweep moves it
    let transitions = body["data"]["transitions"].as_array().unwrap();
    assert!(transitions
        .iter()
        .any(|t| t["reason"] == "Fitness certificate expired"));

    let (status, body) = get_json(&app, "/api/v1/status").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["sweeps_completed"].as_u64().unwrap() >= 1);

    let (status, body) = get_json(&app, "/api/v1/subscriptions").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().is_some());

    let (status, body) = get_json(&app, "/api/v1/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["engine"]["min_trainsets"], 15);
}

#[tokio::test]
async fn validation_errors_use_the_envelope() {
    let app = create_app(seeded_state());

    let (status, body) = post_json(
        &app,
        "/api/v1/decision",
        serde_json::json!({"date": "01/02/2026", "shift": "NIGHT"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = post_json(
        &app,
        "/api/v1/optimize",
        serde_json::json!({"preferences": {"population_size": 1}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}
