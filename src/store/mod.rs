//! Fleet Store Adapter — read/write projection of all persistent entities
//!
//! Presents transactional read-your-writes over whatever backend is in use:
//! - `MemoryStore`: in-memory store for tests and minimal deployments
//! - `SledStore`: embedded sled backend for single-node production
//!
//! All reads return value snapshots; `snapshot()` guarantees the collections
//! it returns are mutually consistent. Writes are atomic per entity with
//! optimistic versioning on trainsets; idempotency keys are claimed through
//! the store so retried commands apply once.

mod memory;
mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    BrandingRecord, CleaningSlot, FitnessCertificate, InductionDecision, JobCard,
    OptimizationRun, Schedule, Shift, StatusAudit, Trainset, TrainsetStatus,
};

// ============================================================================
// Errors
// ============================================================================

/// Store-layer errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("version conflict on {entity} {id}: expected {expected}, found {found}")]
    Conflict {
        entity: &'static str,
        id: String,
        expected: u64,
        found: u64,
    },
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

// ============================================================================
// Context snapshot
// ============================================================================

/// Self-consistent view of the fleet at a point in time.
///
/// Produced by `FleetStore::snapshot`; everything downstream (rules, decision
/// engine, optimizer, simulator) reads only from this value type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Context {
    pub date: NaiveDate,
    pub shift: Shift,
    /// Instant the snapshot was taken; rule evaluators treat this as "now"
    pub taken_at: DateTime<Utc>,
    pub trainsets: Vec<Trainset>,
    pub certificates: Vec<FitnessCertificate>,
    pub job_cards: Vec<JobCard>,
    pub branding: Vec<BrandingRecord>,
    pub cleaning_slots: Vec<CleaningSlot>,
    pub schedules: Vec<Schedule>,
}

impl Context {
    /// Active (non-soft-deleted) trainsets.
    pub fn active_trainsets(&self) -> impl Iterator<Item = &Trainset> {
        self.trainsets.iter().filter(|t| t.is_active)
    }

    /// The certificate considered current for a trainset: the one with the
    /// latest expiry. Expired certificates still count as "present".
    pub fn certificate_for(&self, trainset_id: &str) -> Option<&FitnessCertificate> {
        self.certificates
            .iter()
            .filter(|c| c.trainset_id == trainset_id)
            .max_by_key(|c| c.expires_at)
    }

    /// Open job cards raised against a trainset.
    pub fn open_job_cards_for(&self, trainset_id: &str) -> Vec<&JobCard> {
        self.job_cards
            .iter()
            .filter(|j| j.is_open_against(trainset_id))
            .collect()
    }

    /// Branding contracts live at the snapshot instant for a trainset.
    pub fn active_branding_for(&self, trainset_id: &str) -> Vec<&BrandingRecord> {
        self.branding
            .iter()
            .filter(|b| b.trainset_id == trainset_id && b.is_active_at(self.taken_at))
            .collect()
    }

    /// Mean `current_mileage` across active trainsets; None for an empty
    /// fleet.
    pub fn fleet_mean_mileage(&self) -> Option<f64> {
        let mileages: Vec<f64> = self.active_trainsets().map(|t| t.current_mileage).collect();
        if mileages.is_empty() {
            return None;
        }
        Some(statrs::statistics::Statistics::mean(mileages.iter().copied()))
    }

    /// Absolute mileage deviation of a trainset from the fleet mean, as a
    /// fraction of the mean. Zero for an empty fleet or zero mean.
    pub fn mileage_deviation(&self, trainset: &Trainset) -> f64 {
        match self.fleet_mean_mileage() {
            Some(mean) if mean > 0.0 => (trainset.current_mileage - mean).abs() / mean,
            _ => 0.0,
        }
    }
}

// ============================================================================
// Trainset patch
// ============================================================================

/// Partial update applied to a trainset under optimistic versioning.
///
/// `None` fields are left untouched. The store bumps `version` on apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainsetPatch {
    pub status: Option<TrainsetStatus>,
    pub location: Option<String>,
    pub current_mileage: Option<f64>,
    pub last_maintenance_at: Option<DateTime<Utc>>,
    pub next_maintenance_due_at: Option<DateTime<Utc>>,
    pub last_cleaning_at: Option<DateTime<Utc>>,
    pub next_cleaning_at: Option<DateTime<Utc>>,
    pub fitness_expiry_at: Option<DateTime<Utc>>,
}

impl TrainsetPatch {
    /// Patch that only changes the operational status.
    pub fn status(new_status: TrainsetStatus) -> Self {
        Self {
            status: Some(new_status),
            ..Self::default()
        }
    }

    /// Apply onto a trainset value (shared by all backends).
    pub(crate) fn apply(&self, trainset: &mut Trainset) {
        if let Some(status) = self.status {
            trainset.status = status;
        }
        if let Some(ref location) = self.location {
            trainset.location = location.clone();
        }
        if let Some(mileage) = self.current_mileage {
            trainset.current_mileage = mileage;
        }
        if let Some(at) = self.last_maintenance_at {
            trainset.last_maintenance_at = Some(at);
        }
        if let Some(at) = self.next_maintenance_due_at {
            trainset.next_maintenance_due_at = Some(at);
        }
        if let Some(at) = self.last_cleaning_at {
            trainset.last_cleaning_at = Some(at);
        }
        if let Some(at) = self.next_cleaning_at {
            trainset.next_cleaning_at = Some(at);
        }
        if let Some(at) = self.fitness_expiry_at {
            trainset.fitness_expiry_at = Some(at);
        }
        trainset.version += 1;
    }
}

// ============================================================================
// FleetStore trait
// ============================================================================

/// Pluggable persistence backend for the fleet.
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across async tasks and optimizer worker threads.
pub trait FleetStore: Send + Sync {
    /// Take a mutually consistent snapshot for a planning (date, shift).
    fn snapshot(&self, date: NaiveDate, shift: Shift) -> Result<Context, StoreError>;

    // --- trainsets ---
    fn list_trainsets(&self) -> Result<Vec<Trainset>, StoreError>;
    fn get_trainset(&self, id: &str) -> Result<Trainset, StoreError>;
    fn upsert_trainset(&self, trainset: &Trainset) -> Result<(), StoreError>;
    /// Apply a partial update; `expected_version` guards against lost writes.
    fn patch_trainset(
        &self,
        id: &str,
        patch: &TrainsetPatch,
        expected_version: Option<u64>,
    ) -> Result<Trainset, StoreError>;

    // --- certificates ---
    fn list_certificates(&self) -> Result<Vec<FitnessCertificate>, StoreError>;
    fn upsert_certificate(&self, cert: &FitnessCertificate) -> Result<(), StoreError>;

    // --- job cards ---
    fn list_job_cards(&self) -> Result<Vec<JobCard>, StoreError>;
    fn get_job_card(&self, id: &str) -> Result<JobCard, StoreError>;
    fn upsert_job_card(&self, card: &JobCard) -> Result<(), StoreError>;

    // --- branding ---
    fn list_branding(&self) -> Result<Vec<BrandingRecord>, StoreError>;
    fn upsert_branding(&self, record: &BrandingRecord) -> Result<(), StoreError>;

    // --- cleaning slots ---
    fn list_cleaning_slots(&self) -> Result<Vec<CleaningSlot>, StoreError>;
    fn upsert_cleaning_slot(&self, slot: &CleaningSlot) -> Result<(), StoreError>;

    // --- schedules ---
    fn append_schedule(&self, schedule: &Schedule) -> Result<(), StoreError>;
    fn list_schedules(&self) -> Result<Vec<Schedule>, StoreError>;

    // --- decision audits ---
    fn append_decision(&self, decision: &InductionDecision) -> Result<(), StoreError>;
    fn get_decision(&self, id: &str) -> Result<InductionDecision, StoreError>;
    /// Recent decisions, newest first.
    fn list_decisions(&self, limit: usize) -> Result<Vec<InductionDecision>, StoreError>;

    // --- optimization runs ---
    fn put_run(&self, run: &OptimizationRun) -> Result<(), StoreError>;
    fn get_run(&self, id: &str) -> Result<OptimizationRun, StoreError>;
    fn list_runs(&self, limit: usize) -> Result<Vec<OptimizationRun>, StoreError>;

    // --- status audit ---
    fn append_audit(&self, audit: &StatusAudit) -> Result<(), StoreError>;
    /// Recent audit rows, newest first.
    fn list_audits(&self, limit: usize) -> Result<Vec<StatusAudit>, StoreError>;

    // --- idempotency ---
    /// Claim an idempotency key. Returns `true` on first claim, `false` when
    /// the key was already used (the caller should return the prior result).
    fn claim_idempotency_key(&self, key: &str) -> Result<bool, StoreError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}
