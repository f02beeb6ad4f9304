//! Sled-backed fleet store
//!
//! One sled tree per logical table. Entity tables are keyed by id;
//! time-ordered tables (decisions, audits) use big-endian millisecond
//! timestamps prefixed to the id so iteration is naturally chronological.
//! Values are JSON.
//!
//! Note: writes rely on sled's background flushing for durability. On crash,
//! at most the last few writes may be lost; planning outputs are regenerated
//! each shift.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{
    BrandingRecord, CleaningSlot, FitnessCertificate, InductionDecision, JobCard,
    OptimizationRun, Schedule, Shift, StatusAudit, Trainset,
};

use super::{Context, FleetStore, StoreError, TrainsetPatch};

const TREE_TRAINSETS: &str = "trainsets";
const TREE_CERTIFICATES: &str = "fitness_certificates";
const TREE_JOB_CARDS: &str = "job_cards";
const TREE_BRANDING: &str = "branding_records";
const TREE_CLEANING: &str = "cleaning_slots";
const TREE_SCHEDULES: &str = "schedules";
const TREE_DECISIONS: &str = "induction_decisions";
const TREE_RUNS: &str = "optimization_runs";
const TREE_AUDIT: &str = "status_audit";
const TREE_IDEMPOTENCY: &str = "idempotency_keys";

/// Embedded sled backend.
#[derive(Clone)]
pub struct SledStore {
    db: Arc<sled::Db>,
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Chronological key: big-endian millis then id bytes, so same-instant
/// records stay distinct.
fn time_key(at: DateTime<Utc>, id: &str) -> Vec<u8> {
    let mut key = at.timestamp_millis().to_be_bytes().to_vec();
    key.extend_from_slice(id.as_bytes());
    key
}

impl SledStore {
    /// Open or create the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn tree(&self, name: &str) -> Result<sled::Tree, StoreError> {
        Ok(self.db.open_tree(name)?)
    }

    fn put<T: Serialize>(&self, tree: &str, key: &[u8], value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.tree(tree)?.insert(key, bytes)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, tree: &str, key: &[u8]) -> Result<Option<T>, StoreError> {
        match self.tree(tree)?.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, tree: &str) -> Result<Vec<T>, StoreError> {
        let mut out = Vec::new();
        for item in self.tree(tree)?.iter() {
            let (_key, bytes) = item?;
            out.push(serde_json::from_slice(&bytes)?);
        }
        Ok(out)
    }

    /// Newest-first scan over a chronologically keyed tree.
    fn scan_recent<T: DeserializeOwned>(
        &self,
        tree: &str,
        limit: usize,
    ) -> Result<Vec<T>, StoreError> {
        let mut out = Vec::with_capacity(limit);
        for item in self.tree(tree)?.iter().rev() {
            if out.len() >= limit {
                break;
            }
            let (_key, bytes) = item?;
            out.push(serde_json::from_slice(&bytes)?);
        }
        Ok(out)
    }
}

impl FleetStore for SledStore {
    fn snapshot(&self, date: NaiveDate, shift: Shift) -> Result<Context, StoreError> {
        // Single-process single-writer deployment: sequential tree scans are
        // consistent enough to honor read-your-writes.
        Ok(Context {
            date,
            shift,
            taken_at: Utc::now(),
            trainsets: self.list_trainsets()?,
            certificates: self.list_certificates()?,
            job_cards: self.list_job_cards()?,
            branding: self.list_branding()?,
            cleaning_slots: self.list_cleaning_slots()?,
            schedules: self.list_schedules()?,
        })
    }

    fn list_trainsets(&self) -> Result<Vec<Trainset>, StoreError> {
        let mut out: Vec<Trainset> = self.scan(TREE_TRAINSETS)?;
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn get_trainset(&self, id: &str) -> Result<Trainset, StoreError> {
        self.get(TREE_TRAINSETS, id.as_bytes())?
            .ok_or_else(|| StoreError::NotFound {
                entity: "trainset",
                id: id.to_string(),
            })
    }

    fn upsert_trainset(&self, trainset: &Trainset) -> Result<(), StoreError> {
        self.put(TREE_TRAINSETS, trainset.id.as_bytes(), trainset)
    }

    fn patch_trainset(
        &self,
        id: &str,
        patch: &TrainsetPatch,
        expected_version: Option<u64>,
    ) -> Result<Trainset, StoreError> {
        let mut trainset = self.get_trainset(id)?;
        if let Some(expected) = expected_version {
            if trainset.version != expected {
                return Err(StoreError::Conflict {
                    entity: "trainset",
                    id: id.to_string(),
                    expected,
                    found: trainset.version,
                });
            }
        }
        patch.apply(&mut trainset);
        self.upsert_trainset(&trainset)?;
        Ok(trainset)
    }

    fn list_certificates(&self) -> Result<Vec<FitnessCertificate>, StoreError> {
        let mut out: Vec<FitnessCertificate> = self.scan(TREE_CERTIFICATES)?;
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn upsert_certificate(&self, cert: &FitnessCertificate) -> Result<(), StoreError> {
        self.put(TREE_CERTIFICATES, cert.id.as_bytes(), cert)
    }

    fn list_job_cards(&self) -> Result<Vec<JobCard>, StoreError> {
        let mut out: Vec<JobCard> = self.scan(TREE_JOB_CARDS)?;
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn get_job_card(&self, id: &str) -> Result<JobCard, StoreError> {
        self.get(TREE_JOB_CARDS, id.as_bytes())?
            .ok_or_else(|| StoreError::NotFound {
                entity: "job_card",
                id: id.to_string(),
            })
    }

    fn upsert_job_card(&self, card: &JobCard) -> Result<(), StoreError> {
        self.put(TREE_JOB_CARDS, card.id.as_bytes(), card)
    }

    fn list_branding(&self) -> Result<Vec<BrandingRecord>, StoreError> {
        let mut out: Vec<BrandingRecord> = self.scan(TREE_BRANDING)?;
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn upsert_branding(&self, record: &BrandingRecord) -> Result<(), StoreError> {
        self.put(TREE_BRANDING, record.id.as_bytes(), record)
    }

    fn list_cleaning_slots(&self) -> Result<Vec<CleaningSlot>, StoreError> {
        let mut out: Vec<CleaningSlot> = self.scan(TREE_CLEANING)?;
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn upsert_cleaning_slot(&self, slot: &CleaningSlot) -> Result<(), StoreError> {
        self.put(TREE_CLEANING, slot.id.as_bytes(), slot)
    }

    fn append_schedule(&self, schedule: &Schedule) -> Result<(), StoreError> {
        self.put(
            TREE_SCHEDULES,
            &time_key(schedule.generated_at, &schedule.id),
            schedule,
        )
    }

    fn list_schedules(&self) -> Result<Vec<Schedule>, StoreError> {
        self.scan(TREE_SCHEDULES)
    }

    fn append_decision(&self, decision: &InductionDecision) -> Result<(), StoreError> {
        self.put(
            TREE_DECISIONS,
            &time_key(decision.generated_at, &decision.id),
            decision,
        )
    }

    fn get_decision(&self, id: &str) -> Result<InductionDecision, StoreError> {
        // Decisions are keyed chronologically; id lookup scans backwards and
        // is expected to hit recent entries first.
        for item in self.tree(TREE_DECISIONS)?.iter().rev() {
            let (_key, bytes) = item?;
            let decision: InductionDecision = serde_json::from_slice(&bytes)?;
            if decision.id == id {
                return Ok(decision);
            }
        }
        Err(StoreError::NotFound {
            entity: "decision",
            id: id.to_string(),
        })
    }

    fn list_decisions(&self, limit: usize) -> Result<Vec<InductionDecision>, StoreError> {
        self.scan_recent(TREE_DECISIONS, limit)
    }

    fn put_run(&self, run: &OptimizationRun) -> Result<(), StoreError> {
        self.put(TREE_RUNS, run.id.as_bytes(), run)
    }

    fn get_run(&self, id: &str) -> Result<OptimizationRun, StoreError> {
        self.get(TREE_RUNS, id.as_bytes())?
            .ok_or_else(|| StoreError::NotFound {
                entity: "optimization_run",
                id: id.to_string(),
            })
    }

    fn list_runs(&self, limit: usize) -> Result<Vec<OptimizationRun>, StoreError> {
        let mut out: Vec<OptimizationRun> = self.scan(TREE_RUNS)?;
        out.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        out.truncate(limit);
        Ok(out)
    }

    fn append_audit(&self, audit: &StatusAudit) -> Result<(), StoreError> {
        self.put(TREE_AUDIT, &time_key(audit.occurred_at, &audit.id), audit)
    }

    fn list_audits(&self, limit: usize) -> Result<Vec<StatusAudit>, StoreError> {
        self.scan_recent(TREE_AUDIT, limit)
    }

    fn claim_idempotency_key(&self, key: &str) -> Result<bool, StoreError> {
        let tree = self.tree(TREE_IDEMPOTENCY)?;
        let previous = tree.compare_and_swap(
            key.as_bytes(),
            None::<&[u8]>,
            Some(&[1u8][..]),
        )?;
        Ok(previous.is_ok())
    }

    fn backend_name(&self) -> &'static str {
        "Sled"
    }
}
