//! RAILMIND: Metro Fleet Induction Planning
//!
//! Operations core for nightly fleet induction: for every trainset, decide
//! whether it enters revenue service, stands by, goes to maintenance, or is
//! scheduled for cleaning, and in what running order.
//!
//! ## Architecture
//!
//! - **Rule Evaluators**: six pure scorers (certificate, work-order,
//!   branding, mileage, cleaning, stabling)
//! - **Decision Engine**: explainable ranked induction lists with conflicts
//!   and confidence
//! - **Optimizer**: NSGA-II multi-objective search over induction sets
//! - **What-If Simulator**: typed overlays over immutable snapshots
//! - **Autonomous Status Loop**: timed fleet state maintenance
//! - **Event Bus**: ordered, backpressured per-subscription fan-out

pub mod api;
pub mod bus;
pub mod clock;
pub mod config;
pub mod demo;
pub mod engine;
pub mod optimizer;
pub mod rules;
pub mod simulator;
pub mod status_loop;
pub mod store;
pub mod types;

// Re-export depot configuration
pub use config::DepotConfig;

// Re-export commonly used types
pub use types::{
    Conflict, ConflictKind, ConflictSeverity, Event, EventKind, FitnessCertificate,
    InductionChoice, InductionDecision, JobCard, JobCardPriority, JobCardStatus,
    OptimizationParameters, OptimizationRun, RankedTrainset, ReadinessClass, RunStatus, Schedule,
    Shift, Trainset, TrainsetStatus,
};

// Re-export core components
pub use bus::EventBus;
pub use engine::{DecisionEngine, DecisionError};
pub use optimizer::{OptimizeError, OptimizerPool};
pub use simulator::{SimulationError, WhatIfSimulator};
pub use status_loop::StatusLoop;
pub use store::{Context, FleetStore, MemoryStore, SledStore, StoreError};
