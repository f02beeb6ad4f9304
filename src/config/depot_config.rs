//! Depot Configuration - all planning thresholds as operator-tunable TOML values
//!
//! Every constant that shapes an induction decision is a field in this module.
//! Each struct implements `Default` with values matching `config::defaults`,
//! so behavior is unchanged when no config file is present.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::types::ObjectiveWeights;

use super::defaults;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a depot deployment.
///
/// Load with `DepotConfig::load()` which searches:
/// 1. `$RAILMIND_CONFIG` env var
/// 2. `./railmind.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepotConfig {
    /// Depot identification
    #[serde(default)]
    pub depot: DepotInfo,

    /// Decision-engine thresholds and rule weights
    #[serde(default)]
    pub engine: EngineConfig,

    /// Optimizer parameters
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Autonomous status loop schedule
    #[serde(default)]
    pub status_loop: StatusLoopConfig,

    /// Event bus queue sizing and policies
    #[serde(default)]
    pub bus: BusConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for DepotConfig {
    fn default() -> Self {
        Self {
            depot: DepotInfo::default(),
            engine: EngineConfig::default(),
            optimizer: OptimizerConfig::default(),
            status_loop: StatusLoopConfig::default(),
            bus: BusConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Depot identity and local-time handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepotInfo {
    /// Depot name; also the home-depot match for the stabling rule
    pub name: String,
    /// Offset of depot local time from UTC, in minutes
    pub utc_offset_minutes: i32,
}

impl Default for DepotInfo {
    fn default() -> Self {
        Self {
            name: "Muttom".to_string(),
            utc_offset_minutes: 0,
        }
    }
}

// ============================================================================
// Decision Engine
// ============================================================================

/// Weights for the six rule evaluators. Fixed per run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RuleWeights {
    pub certificate: f64,
    pub job_card: f64,
    pub branding: f64,
    pub mileage: f64,
    pub cleaning: f64,
    pub stabling: f64,
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            certificate: 0.25,
            job_card: 0.20,
            branding: 0.15,
            mileage: 0.15,
            cleaning: 0.15,
            stabling: 0.10,
        }
    }
}

impl RuleWeights {
    /// Sum of all six weights (validation expects ~1.0).
    pub fn total(&self) -> f64 {
        self.certificate + self.job_card + self.branding + self.mileage + self.cleaning
            + self.stabling
    }
}

/// Decision-engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub min_trainsets: usize,
    pub max_trainsets: usize,
    /// INDUCTION_READY count below which a CAPACITY conflict is raised
    pub min_ready: usize,
    #[serde(default)]
    pub weights: RuleWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_trainsets: defaults::MIN_TRAINSETS,
            max_trainsets: defaults::MAX_TRAINSETS,
            min_ready: defaults::MIN_READY_TRAINSETS,
            weights: RuleWeights::default(),
        }
    }
}

// ============================================================================
// Optimizer
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub population_size: usize,
    pub max_generations: usize,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub elitism: f64,
    /// Worker pool size; 0 means "available cores"
    pub worker_pool: usize,
    /// Hard wall-clock budget per run (seconds)
    pub run_hard_timeout_secs: u64,
    #[serde(default)]
    pub objective_weights: ObjectiveWeights,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population_size: defaults::POPULATION_SIZE,
            max_generations: defaults::MAX_GENERATIONS,
            mutation_rate: defaults::MUTATION_RATE,
            crossover_rate: defaults::CROSSOVER_RATE,
            elitism: defaults::ELITISM_FRACTION,
            worker_pool: 0,
            run_hard_timeout_secs: defaults::RUN_HARD_TIMEOUT_SECS,
            objective_weights: ObjectiveWeights::default(),
        }
    }
}

impl OptimizerConfig {
    /// Resolved worker pool size.
    pub fn effective_workers(&self) -> usize {
        if self.worker_pool == 0 {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4)
        } else {
            self.worker_pool
        }
    }
}

// ============================================================================
// Status Loop
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusLoopConfig {
    /// Whether the hourly sweep runs at all
    pub hourly_sweep: bool,
    /// Nightly cleaning window start, depot local time ("HH:MM")
    pub cleaning_start: String,
    /// Nightly cleaning window end, depot local time ("HH:MM")
    pub cleaning_end: String,
    /// Fraction of overdue AVAILABLE trainsets selected for cleaning
    pub cleaning_selection_ratio: f64,
    /// Cleaning cycle length in days
    pub cleaning_cycle_days: i64,
}

impl Default for StatusLoopConfig {
    fn default() -> Self {
        Self {
            hourly_sweep: true,
            cleaning_start: "22:00".to_string(),
            cleaning_end: "00:00".to_string(),
            cleaning_selection_ratio: defaults::CLEANING_SELECTION_RATIO,
            cleaning_cycle_days: defaults::CLEANING_CYCLE_DAYS,
        }
    }
}

impl StatusLoopConfig {
    /// Parse an "HH:MM" wall-clock string into (hour, minute).
    pub fn parse_wall_time(s: &str) -> Option<(u32, u32)> {
        let (h, m) = s.split_once(':')?;
        let hour: u32 = h.parse().ok()?;
        let minute: u32 = m.parse().ok()?;
        (hour < 24 && minute < 60).then_some((hour, minute))
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Backpressure policy names at the config edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicyName {
    DropOldest,
    BlockProducer,
    DropSubscription,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Per-subscription bounded queue capacity
    pub subscription_queue: usize,
    /// Grace period before a slow consumer is escalated (seconds)
    pub slow_consumer_grace_secs: u64,
    /// Per-topic policy overrides (topic wire name -> policy)
    #[serde(default)]
    pub topic_policies: std::collections::HashMap<String, BackpressurePolicyName>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            subscription_queue: defaults::SUBSCRIPTION_QUEUE_CAPACITY,
            slow_consumer_grace_secs: defaults::SLOW_CONSUMER_GRACE_SECS,
            topic_policies: std::collections::HashMap::new(),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

// ============================================================================
// Loading & Validation
// ============================================================================

impl DepotConfig {
    /// Load configuration using the standard search order:
    /// 1. `$RAILMIND_CONFIG` environment variable
    /// 2. `./railmind.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("RAILMIND_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), depot = %config.depot.name, "Loaded depot config from RAILMIND_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from RAILMIND_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "RAILMIND_CONFIG points to non-existent file, falling back");
            }
        }

        let local = Path::new("railmind.toml");
        if local.exists() {
            match Self::load_from_file(local) {
                Ok(config) => {
                    info!(depot = %config.depot.name, "Loaded depot config from ./railmind.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./railmind.toml, using defaults");
                }
            }
        }

        info!("No depot config found, using built-in defaults");
        Self::default()
    }

    /// Load and parse a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        let config: DepotConfig = toml::from_str(&raw).map_err(|e| e.to_string())?;
        let issues = config.validate();
        if issues.is_empty() {
            Ok(config)
        } else {
            Err(format!("invalid config: {}", issues.join("; ")))
        }
    }

    /// Validate cross-field constraints. Returns human-readable issues.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if (self.engine.weights.total() - 1.0).abs() > 0.01 {
            issues.push(format!(
                "engine rule weights sum to {:.3}, expected 1.0",
                self.engine.weights.total()
            ));
        }
        if self.engine.min_trainsets > self.engine.max_trainsets {
            issues.push(format!(
                "engine.min_trainsets {} exceeds engine.max_trainsets {}",
                self.engine.min_trainsets, self.engine.max_trainsets
            ));
        }
        if self.optimizer.population_size < 2 {
            issues.push("optimizer.population_size must be at least 2".to_string());
        }
        if !(0.0..=1.0).contains(&self.optimizer.mutation_rate) {
            issues.push("optimizer.mutation_rate must be within [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.optimizer.crossover_rate) {
            issues.push("optimizer.crossover_rate must be within [0, 1]".to_string());
        }
        if !(0.0..=0.5).contains(&self.optimizer.elitism) {
            issues.push("optimizer.elitism must be within [0, 0.5]".to_string());
        }
        if (self.optimizer.objective_weights.total() - 1.0).abs() > 0.01 {
            issues.push(format!(
                "optimizer objective weights sum to {:.3}, expected 1.0",
                self.optimizer.objective_weights.total()
            ));
        }
        if !(0.0..=1.0).contains(&self.status_loop.cleaning_selection_ratio)
            || self.status_loop.cleaning_selection_ratio == 0.0
        {
            issues.push("status_loop.cleaning_selection_ratio must be within (0, 1]".to_string());
        }
        if StatusLoopConfig::parse_wall_time(&self.status_loop.cleaning_start).is_none() {
            issues.push(format!(
                "status_loop.cleaning_start '{}' is not HH:MM",
                self.status_loop.cleaning_start
            ));
        }
        if StatusLoopConfig::parse_wall_time(&self.status_loop.cleaning_end).is_none() {
            issues.push(format!(
                "status_loop.cleaning_end '{}' is not HH:MM",
                self.status_loop.cleaning_end
            ));
        }
        if self.bus.subscription_queue == 0 {
            issues.push("bus.subscription_queue must be positive".to_string());
        }
        for topic in self.bus.topic_policies.keys() {
            if crate::types::EventKind::parse(topic).is_none() {
                issues.push(format!("bus.topic_policies names unknown topic '{topic}'"));
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_clean() {
        assert!(DepotConfig::default().validate().is_empty());
    }

    #[test]
    fn weight_sum_checked() {
        let mut config = DepotConfig::default();
        config.engine.weights.certificate = 0.9;
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("rule weights")));
    }

    #[test]
    fn bad_wall_time_rejected() {
        assert_eq!(StatusLoopConfig::parse_wall_time("22:00"), Some((22, 0)));
        assert_eq!(StatusLoopConfig::parse_wall_time("00:30"), Some((0, 30)));
        assert_eq!(StatusLoopConfig::parse_wall_time("24:00"), None);
        assert_eq!(StatusLoopConfig::parse_wall_time("2200"), None);
    }

    #[test]
    fn unknown_topic_policy_rejected() {
        let mut config = DepotConfig::default();
        config
            .bus
            .topic_policies
            .insert("nope.topic".to_string(), BackpressurePolicyName::DropOldest);
        assert!(!config.validate().is_empty());
    }

    #[test]
    fn toml_round_trip() {
        let config = DepotConfig::default();
        let raw = toml::to_string(&config).unwrap();
        let back: DepotConfig = toml::from_str(&raw).unwrap();
        assert_eq!(back.engine.min_trainsets, config.engine.min_trainsets);
        assert_eq!(back.status_loop.cleaning_start, "22:00");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let raw = r#"
            [engine]
            min_trainsets = 10
            max_trainsets = 20
            min_ready = 10
        "#;
        let config: DepotConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.engine.min_trainsets, 10);
        assert_eq!(config.optimizer.population_size, 50);
        assert!((config.engine.weights.total() - 1.0).abs() < 0.01);
    }
}
