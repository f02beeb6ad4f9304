//! Core domain types for fleet induction planning.
//!
//! Split by concern:
//! - `trainset`: Trainset, TrainsetStatus, FitnessCertificate
//! - `jobcard`: work orders
//! - `branding`: advertising exposure contracts
//! - `cleaning`: cleaning bay slots
//! - `schedule`: shifts, schedules, induction choices
//! - `decision`: ranked lists, conflicts, the decision audit record
//! - `optimization`: objectives, plans, runs, reports
//! - `simulation`: what-if overlays and comparisons
//! - `audit`: status transition audit rows
//! - `event`: event envelope and topic enumeration

mod audit;
mod branding;
mod cleaning;
mod decision;
mod event;
mod jobcard;
mod optimization;
mod schedule;
mod simulation;
mod trainset;

pub use audit::{StatusAudit, SweepReport};
pub use branding::BrandingRecord;
pub use cleaning::CleaningSlot;
pub use decision::{
    Conflict, ConflictKind, ConflictSeverity, FactorImpact, InductionDecision, KeyFactor,
    RankedTrainset, ReadinessClass, Recommendation, RecommendationKind, RuleScores,
};
pub use event::{Event, EventKind};
pub use jobcard::{JobCard, JobCardPriority, JobCardStatus};
pub use optimization::{
    InductionPlan, ObjectiveScores, ObjectiveWeights, OptimizationParameters, OptimizationReport,
    OptimizationRun, PopulationStats, RunStatus,
};
pub use schedule::{InductionChoice, Schedule, ScheduleEntry, Shift};
pub use simulation::{
    FitnessModification, JobCardModification, MetricDelta, ScenarioBase, ScenarioComparison,
    ScenarioMetrics, ScenarioOutcome, ScenarioVariation, SimulationResult, TrainsetModification,
};
pub use trainset::{CertificateStatus, FitnessCertificate, Trainset, TrainsetStatus};
