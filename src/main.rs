//! RAILMIND - Metro Fleet Induction Planning Service
//!
//! Nightly induction decisions, schedule optimization, autonomous status
//! maintenance, and real-time event fan-out for a metro depot.
//!
//! # Usage
//!
//! ```bash
//! # Run with an embedded sled store and a seeded demo fleet
//! cargo run --release -- --seed-demo
//!
//! # Run against an existing data directory
//! cargo run --release -- --data-dir /var/lib/railmind
//!
//! # In-memory store (nothing persisted)
//! cargo run --release -- --memory --seed-demo
//! ```
//!
//! # Environment Variables
//!
//! - `RAILMIND_CONFIG`: Path to a TOML depot configuration
//! - `RUST_LOG`: Logging level (default: info)

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use railmind::api::{create_app, ApiState};
use railmind::bus::EventBus;
use railmind::clock::SystemClock;
use railmind::config::{self, defaults::SHUTDOWN_GRACE_SECS, DepotConfig};
use railmind::engine::DecisionEngine;
use railmind::optimizer::OptimizerPool;
use railmind::simulator::WhatIfSimulator;
use railmind::status_loop::StatusLoop;
use railmind::store::{FleetStore, MemoryStore, SledStore};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "railmind")]
#[command(about = "RAILMIND Metro Fleet Induction Planning Service")]
#[command(version)]
struct CliArgs {
    /// Override the server address (default from config: "0.0.0.0:8080")
    #[arg(short, long)]
    addr: Option<String>,

    /// Data directory for the embedded store
    #[arg(long, default_value = "railmind-data")]
    data_dir: String,

    /// Use an in-memory store instead of sled (nothing persisted)
    #[arg(long)]
    memory: bool,

    /// Seed a demo fleet into the store at startup
    #[arg(long)]
    seed_demo: bool,

    /// Wipe the data directory before opening the store.
    /// WARNING: This is destructive and cannot be undone!
    #[arg(long)]
    reset_db: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.json_logs);

    config::init(DepotConfig::load());
    let depot_config = config::get();
    info!(depot = %depot_config.depot.name, "RAILMIND starting");

    // --- Store ---
    if args.reset_db && !args.memory {
        warn!(data_dir = %args.data_dir, "Resetting data directory");
        let _ = std::fs::remove_dir_all(&args.data_dir);
    }
    let store: Arc<dyn FleetStore> = if args.memory {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(
            SledStore::open(&args.data_dir)
                .with_context(|| format!("opening store at {}", args.data_dir))?,
        )
    };
    info!(backend = store.backend_name(), "Fleet store ready");

    if args.seed_demo {
        railmind::demo::seed_fleet(store.as_ref()).context("seeding demo fleet")?;
    }

    // --- Core components ---
    let bus = Arc::new(EventBus::new(&depot_config.bus));
    let engine = DecisionEngine::new(depot_config.engine.clone());
    let optimizer = Arc::new(OptimizerPool::new(
        store.clone(),
        bus.clone(),
        depot_config.optimizer.clone(),
    ));
    let simulator = Arc::new(WhatIfSimulator::new(
        store.clone(),
        engine.clone(),
        depot_config.optimizer.clone(),
    ));
    let status_loop = Arc::new(StatusLoop::new(
        store.clone(),
        bus.clone(),
        Arc::new(SystemClock),
        depot_config.status_loop.clone(),
        depot_config.depot.clone(),
    ));

    // --- Background supervisor ---
    let cancel = CancellationToken::new();
    let loop_handle = tokio::spawn(status_loop.clone().run(cancel.clone()));

    // --- HTTP server ---
    let state = ApiState {
        store,
        engine,
        optimizer: optimizer.clone(),
        simulator,
        status_loop,
        bus,
        started_at: chrono::Utc::now(),
    };
    let app = create_app(state);

    let addr = args
        .addr
        .unwrap_or_else(|| depot_config.server.listen_addr.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Command surface listening");

    let shutdown_cancel = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            shutdown_cancel.cancel();
        })
        .await
        .context("serving")?;

    // --- Clean shutdown: wait for in-flight work, then cancel the rest ---
    let grace = std::time::Duration::from_secs(SHUTDOWN_GRACE_SECS);
    optimizer.shutdown(grace).await;
    let _ = tokio::time::timeout(grace, loop_handle).await;
    info!("RAILMIND stopped");
    Ok(())
}
