//! What-if simulation types: scenarios, overlays, comparisons

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::optimization::OptimizationParameters;
use super::schedule::Shift;
use super::trainset::{CertificateStatus, TrainsetStatus};
use super::jobcard::{JobCardPriority, JobCardStatus};

// ============================================================================
// Overlays
// ============================================================================

/// Overlay mutation on a fitness certificate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FitnessModification {
    pub trainset_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<CertificateStatus>,
}

/// Overlay mutation on a job card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobCardModification {
    pub jobcard_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<JobCardStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_priority: Option<JobCardPriority>,
}

/// Overlay mutation on a trainset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainsetModification {
    pub trainset_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<TrainsetStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_mileage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_location: Option<String>,
}

/// A named variation: typed overlays applied on top of the base context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioVariation {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fitness_modifications: Vec<FitnessModification>,
    #[serde(default)]
    pub jobcard_modifications: Vec<JobCardModification>,
    #[serde(default)]
    pub trainset_modifications: Vec<TrainsetModification>,
}

/// Base scenario definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioBase {
    pub date: NaiveDate,
    pub shift: Shift,
    /// Optimizer preference overrides for all scenarios in the simulation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimizer_preferences: Option<OptimizationParameters>,
}

// ============================================================================
// Outcomes
// ============================================================================

/// Metric vector computed per scenario.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ScenarioMetrics {
    pub service_readiness: f64,
    pub reliability: f64,
    pub cost_efficiency: f64,
    pub branding_exposure: f64,
    pub energy_efficiency: f64,
    /// Weighted overall score used for best-scenario selection
    pub overall_score: f64,
    pub constraint_violations: usize,
    pub recommendation_count: usize,
}

/// Outcome of evaluating one scenario (base or variation).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioOutcome {
    pub name: String,
    pub metrics: ScenarioMetrics,
    /// Conflicts from the decision engine for this scenario
    pub conflict_count: usize,
    /// Induction-ready trainsets in this scenario
    pub ready_count: usize,
}

/// Per-metric delta of a variation versus the base scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricDelta {
    pub metric: String,
    pub base: f64,
    pub variation: f64,
    /// variation - base; positive is an improvement
    pub delta: f64,
}

/// Comparison of every variation against the base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioComparison {
    /// Variation name -> per-metric deltas
    pub deltas: Vec<(String, Vec<MetricDelta>)>,
    /// Name of the scenario with the highest overall score
    pub best_scenario: String,
    /// Best overall score minus base overall score
    pub expected_improvement: f64,
}

/// Complete simulation result, memoized under `simulation_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationResult {
    /// Stable id derived from the base and variation definitions
    pub simulation_id: String,
    pub requested_at: DateTime<Utc>,
    pub base: ScenarioOutcome,
    pub variations: Vec<ScenarioOutcome>,
    pub comparison: ScenarioComparison,
    /// Simulation-level recommendations (BEST_SCENARIO and friends)
    pub recommendations: Vec<super::decision::Recommendation>,
}

impl SimulationResult {
    /// Render the per-scenario metric table as CSV.
    pub fn to_csv(&self) -> String {
        let mut out = String::from(
            "scenario,service_readiness,reliability,cost_efficiency,branding_exposure,\
             energy_efficiency,overall_score,constraint_violations,recommendation_count\n",
        );
        let mut push_row = |outcome: &ScenarioOutcome| {
            let m = &outcome.metrics;
            out.push_str(&format!(
                "{},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{},{}\n",
                outcome.name,
                m.service_readiness,
                m.reliability,
                m.cost_efficiency,
                m.branding_exposure,
                m.energy_efficiency,
                m.overall_score,
                m.constraint_violations,
                m.recommendation_count,
            ));
        };
        push_row(&self.base);
        for v in &self.variations {
            push_row(v);
        }
        out
    }
}
