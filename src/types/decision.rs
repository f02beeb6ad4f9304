//! Induction decision types: rankings, conflicts, key factors, audit record

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::schedule::{InductionChoice, Shift};

// ============================================================================
// Readiness Classification
// ============================================================================

/// Induction readiness class derived from composite score and rule
/// eligibility.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessClass {
    /// Eligible, composite >= 80
    InductionReady,
    /// Eligible, composite in [60, 80)
    ConditionalReady,
    /// Eligible but composite < 60
    RequiresAttention,
    /// Certificate or work-order rule disqualifies
    NotReady,
}

impl std::fmt::Display for ReadinessClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadinessClass::InductionReady => write!(f, "Induction Ready"),
            ReadinessClass::ConditionalReady => write!(f, "Conditional"),
            ReadinessClass::RequiresAttention => write!(f, "Requires Attention"),
            ReadinessClass::NotReady => write!(f, "Not Ready"),
        }
    }
}

// ============================================================================
// Per-Trainset Ranking
// ============================================================================

/// Scores from the six rule evaluators for one trainset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleScores {
    pub certificate: f64,
    pub job_card: f64,
    pub branding: f64,
    pub mileage: f64,
    pub cleaning: f64,
    pub stabling: f64,
}

/// One row of the ranked induction list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedTrainset {
    pub trainset_id: String,
    pub trainset_number: String,
    /// 1-based position in the running order
    pub rank: u32,
    /// Weighted composite of the six rule scores, [0, 100]
    pub composite_score: f64,
    pub readiness: ReadinessClass,
    pub decision: InductionChoice,
    pub scores: RuleScores,
    /// Mileage deviation from fleet mean, percent (ranking tie-break)
    pub mileage_deviation_percent: f64,
    /// Warnings collected verbatim from the rule evaluators
    pub warnings: Vec<String>,
}

// ============================================================================
// Conflicts
// ============================================================================

/// Conflict category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    /// Fewer induction-ready trainsets than the service minimum
    Capacity,
    /// A selected trainset trips a CRITICAL rule
    CriticalRule,
    /// Cleaning bay demand exceeds slot capacity
    CleaningCapacity,
}

/// Conflict severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictSeverity::Low => write!(f, "LOW"),
            ConflictSeverity::Medium => write!(f, "MEDIUM"),
            ConflictSeverity::High => write!(f, "HIGH"),
            ConflictSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A conflict surfaced by the decision engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub severity: ConflictSeverity,
    pub description: String,
    /// Trainsets implicated in the conflict
    pub trainset_ids: Vec<String>,
}

// ============================================================================
// Key Factors & Recommendations
// ============================================================================

/// Impact level of a key decision factor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactorImpact {
    Info,
    Warning,
    Critical,
}

/// A factor that materially shaped the decision, surfaced for explainability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyFactor {
    /// Rule or subsystem that produced the factor (e.g. "certificate")
    pub factor: String,
    pub impact: FactorImpact,
    pub description: String,
}

/// Recommendation category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationKind {
    ScheduleMaintenance,
    RenewCertificate,
    BalanceMileage,
    ScheduleCleaning,
    PrioritizeBranding,
    BestScenario,
}

/// An actionable recommendation attached to a decision or simulation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
    pub trainset_ids: Vec<String>,
    /// Expected improvement in overall score, when quantifiable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_improvement: Option<f64>,
}

// ============================================================================
// Induction Decision (audit)
// ============================================================================

/// Immutable audit snapshot of one induction decision.
///
/// `inputs_hash` fingerprints the context the decision was computed from;
/// repeated evaluation over the same context yields an identical record
/// apart from `id` and `generated_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InductionDecision {
    pub id: String,
    pub generated_at: DateTime<Utc>,
    pub date: NaiveDate,
    pub shift: Shift,
    pub ranked_list: Vec<RankedTrainset>,
    pub warnings: Vec<String>,
    pub conflicts: Vec<Conflict>,
    pub key_factors: Vec<KeyFactor>,
    pub recommendations: Vec<Recommendation>,
    /// Deterministic confidence in [0, 100]
    pub confidence: f64,
    /// md5 fingerprint of the context snapshot
    pub inputs_hash: String,
}

impl InductionDecision {
    /// Count of trainsets in a given readiness class.
    pub fn count_in_class(&self, class: ReadinessClass) -> usize {
        self.ranked_list
            .iter()
            .filter(|r| r.readiness == class)
            .count()
    }
}
