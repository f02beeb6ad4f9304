//! System-wide default constants.
//!
//! Centralises the planning constants so that every subsystem reads the same
//! values. Grouped by subsystem for easy discovery.

// ============================================================================
// Decision Engine
// ============================================================================

/// Minimum trainsets that must be INDUCTION_READY before the decision is
/// conflict-free.
pub const MIN_READY_TRAINSETS: usize = 15;

/// Default lower bound on an induction set.
pub const MIN_TRAINSETS: usize = 15;

/// Default upper bound on an induction set.
pub const MAX_TRAINSETS: usize = 25;

/// Composite score threshold for INDUCTION_READY.
pub const READY_THRESHOLD: f64 = 80.0;

/// Composite score threshold for CONDITIONAL_READY.
pub const CONDITIONAL_THRESHOLD: f64 = 60.0;

// ============================================================================
// Rule Evaluators
// ============================================================================

/// Cleaning cycle length (days). A trainset past this since its last
/// cleaning needs a bay slot.
pub const CLEANING_CYCLE_DAYS: i64 = 7;

/// Mileage deviation (fraction of fleet mean) beyond which a trainset is
/// flagged for balancing.
pub const MILEAGE_BALANCE_THRESHOLD: f64 = 0.10;

// ============================================================================
// Optimizer
// ============================================================================

/// Default NSGA-II population size.
pub const POPULATION_SIZE: usize = 50;

/// Default generation cap.
pub const MAX_GENERATIONS: usize = 100;

/// Per-individual mutation probability.
pub const MUTATION_RATE: f64 = 0.1;

/// Crossover probability.
pub const CROSSOVER_RATE: f64 = 0.9;

/// Fraction of the population carried over unchanged each generation.
pub const ELITISM_FRACTION: f64 = 0.1;

/// Tournament size for selection.
pub const TOURNAMENT_SIZE: usize = 3;

/// Penalty applied to the constraint score when below MIN_TRAINSETS.
pub const UNDERSIZE_PENALTY: f64 = -50.0;

/// Penalty applied to the constraint score when above MAX_TRAINSETS.
pub const OVERSIZE_PENALTY: f64 = -20.0;

/// Hard wall-clock budget for a whole optimization run (seconds).
pub const RUN_HARD_TIMEOUT_SECS: u64 = 300;

/// Cancellation-check interval inside the evaluation loop (milliseconds).
pub const CANCEL_CHECK_INTERVAL_MS: u64 = 1_000;

// ============================================================================
// Status Loop
// ============================================================================

/// Interval between hourly status sweeps (seconds).
pub const SWEEP_INTERVAL_SECS: u64 = 3_600;

/// Fraction of overdue AVAILABLE trainsets sent to cleaning each night.
pub const CLEANING_SELECTION_RATIO: f64 = 0.30;

/// Hours since last cleaning after which a trainset qualifies for the
/// nightly rotation.
pub const CLEANING_OVERDUE_HOURS: i64 = 20;

/// Maintenance alerts fire when the due date is within this window (hours).
pub const MAINTENANCE_ALERT_WINDOW_HOURS: i64 = 48;

/// Certificate-expiry alerts fire when expiry is within this window (days).
pub const CERTIFICATE_ALERT_WINDOW_DAYS: i64 = 7;

// ============================================================================
// Event Bus
// ============================================================================

/// Per-subscription bounded queue capacity.
pub const SUBSCRIPTION_QUEUE_CAPACITY: usize = 1_024;

/// Grace period before a blocked producer escalates or a slow subscription
/// is dropped (seconds).
pub const SLOW_CONSUMER_GRACE_SECS: u64 = 5;

// ============================================================================
// Store & Shutdown
// ============================================================================

/// Snapshot acquisition timeout (seconds).
pub const SNAPSHOT_TIMEOUT_SECS: u64 = 5;

/// Grace period for in-flight work during shutdown (seconds).
pub const SHUTDOWN_GRACE_SECS: u64 = 30;
