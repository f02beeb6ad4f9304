//! Optimization types: objectives, induction plans, runs, reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Objectives
// ============================================================================

/// Scores for the five optimization objectives, each in [0, 100].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ObjectiveScores {
    pub service_readiness: f64,
    pub reliability: f64,
    pub cost_efficiency: f64,
    pub branding_exposure: f64,
    pub energy_efficiency: f64,
}

impl ObjectiveScores {
    /// All five scores as an array, in declaration order.
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.service_readiness,
            self.reliability,
            self.cost_efficiency,
            self.branding_exposure,
            self.energy_efficiency,
        ]
    }

    /// Pareto dominance: at least equal on every objective, strictly better
    /// on at least one.
    pub fn dominates(&self, other: &ObjectiveScores) -> bool {
        let a = self.as_array();
        let b = other.as_array();
        let mut strictly_better = false;
        for (x, y) in a.iter().zip(b.iter()) {
            if x < y {
                return false;
            }
            if x > y {
                strictly_better = true;
            }
        }
        strictly_better
    }

    /// Weighted scalar fitness under the given objective weights.
    pub fn weighted(&self, weights: &ObjectiveWeights) -> f64 {
        self.service_readiness * weights.service_readiness
            + self.reliability * weights.reliability
            + self.cost_efficiency * weights.cost_efficiency
            + self.branding_exposure * weights.branding_exposure
            + self.energy_efficiency * weights.energy_efficiency
    }
}

/// Relative weights for scalarizing the five objectives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ObjectiveWeights {
    pub service_readiness: f64,
    pub reliability: f64,
    pub cost_efficiency: f64,
    pub branding_exposure: f64,
    pub energy_efficiency: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            service_readiness: 0.30,
            reliability: 0.25,
            cost_efficiency: 0.15,
            branding_exposure: 0.15,
            energy_efficiency: 0.15,
        }
    }
}

impl ObjectiveWeights {
    /// Sum of weights; used by config validation (should be ~1.0).
    pub fn total(&self) -> f64 {
        self.service_readiness
            + self.reliability
            + self.cost_efficiency
            + self.branding_exposure
            + self.energy_efficiency
    }
}

// ============================================================================
// Solutions
// ============================================================================

/// One candidate induction plan: a subset of eligible trainsets in running
/// order, with its evaluated objective scores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InductionPlan {
    /// Selected trainset ids, in running order
    pub subset: Vec<String>,
    pub objectives: ObjectiveScores,
    /// Weighted scalar fitness used for tournament selection
    pub fitness: f64,
    /// Constraint score: 0 when feasible, negative penalties otherwise
    pub constraint_score: f64,
    /// Human-readable constraint violations
    pub violations: Vec<String>,
}

impl InductionPlan {
    /// Whether the plan satisfies all hard constraints.
    pub fn is_feasible(&self) -> bool {
        self.constraint_score >= 0.0 && self.violations.is_empty()
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Tunable parameters for one optimization run.
///
/// Deserializes leniently: absent fields take their defaults, so API callers
/// can send partial preference objects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OptimizationParameters {
    pub population_size: usize,
    pub max_generations: usize,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    /// Fraction of the population carried over unchanged each generation
    pub elitism: f64,
    pub min_trainsets: usize,
    pub max_trainsets: usize,
    /// Objective weights for scalar fitness
    pub weights: ObjectiveWeights,
    /// RNG seed; a fixed seed makes the run reproducible
    pub seed: u64,
}

impl Default for OptimizationParameters {
    fn default() -> Self {
        Self {
            population_size: 50,
            max_generations: 100,
            mutation_rate: 0.1,
            crossover_rate: 0.9,
            elitism: 0.1,
            min_trainsets: 15,
            max_trainsets: 25,
            weights: ObjectiveWeights::default(),
            seed: 0,
        }
    }
}

// ============================================================================
// Run lifecycle
// ============================================================================

/// Lifecycle state of an optimization run.
/// COMPLETED, FAILED, CANCELLED, and TIMED_OUT are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled | RunStatus::TimedOut
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Queued => write!(f, "Queued"),
            RunStatus::Running => write!(f, "Running"),
            RunStatus::Completed => write!(f, "Completed"),
            RunStatus::Failed => write!(f, "Failed"),
            RunStatus::Cancelled => write!(f, "Cancelled"),
            RunStatus::TimedOut => write!(f, "Timed Out"),
        }
    }
}

/// Population statistics for one generation (or the final population).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PopulationStats {
    pub generation: usize,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub fitness_std_dev: f64,
    pub feasible_count: usize,
    pub pareto_front_size: usize,
}

/// Performance report attached to a completed run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OptimizationReport {
    /// Top solutions by weighted fitness (at most five)
    pub top_solutions: Vec<InductionPlan>,
    pub population: PopulationStats,
    /// Distinct constraint violations observed in the final population
    pub constraint_violations: Vec<String>,
    /// Natural-language recommendations derived from objective gaps
    pub recommendations: Vec<String>,
    pub generations_completed: usize,
    pub elapsed_ms: u64,
}

/// A single optimization run, observable by snapshot.
///
/// Mutated only by the worker that owns it; readers receive clones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizationRun {
    pub id: String,
    pub requested_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub algorithm: String,
    pub parameters: OptimizationParameters,
    pub status: RunStatus,
    /// Progress in [0, 1]
    pub progress: f64,
    pub best_solution: Option<InductionPlan>,
    /// First non-dominated front of the final (or last completed) generation
    pub pareto_front: Vec<InductionPlan>,
    pub report: Option<OptimizationReport>,
    pub error: Option<String>,
}

impl OptimizationRun {
    /// New queued run with the given parameters.
    pub fn queued(id: String, parameters: OptimizationParameters) -> Self {
        Self {
            id,
            requested_at: Utc::now(),
            started_at: None,
            finished_at: None,
            algorithm: "nsga2".to_string(),
            parameters,
            status: RunStatus::Queued,
            progress: 0.0,
            best_solution: None,
            pareto_front: Vec::new(),
            report: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominance_requires_strict_improvement() {
        let a = ObjectiveScores {
            service_readiness: 90.0,
            reliability: 80.0,
            cost_efficiency: 70.0,
            branding_exposure: 60.0,
            energy_efficiency: 50.0,
        };
        let b = a;
        assert!(!a.dominates(&b));

        let mut c = a;
        c.reliability = 85.0;
        assert!(c.dominates(&a));
        assert!(!a.dominates(&c));
    }

    #[test]
    fn mixed_objectives_do_not_dominate() {
        let a = ObjectiveScores {
            service_readiness: 90.0,
            reliability: 60.0,
            ..Default::default()
        };
        let b = ObjectiveScores {
            service_readiness: 80.0,
            reliability: 70.0,
            ..Default::default()
        };
        assert!(!a.dominates(&b));
        assert!(!b.dominates(&a));
    }

    #[test]
    fn default_weights_sum_to_one() {
        assert!((ObjectiveWeights::default().total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn terminal_statuses() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::TimedOut.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(!RunStatus::Queued.is_terminal());
    }
}
