//! In-memory fleet store for tests and minimal deployments
//!
//! A single `RwLock` guards all tables, which makes `snapshot()` trivially
//! consistent. Not durable — data is lost on restart.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{NaiveDate, Utc};

use crate::types::{
    BrandingRecord, CleaningSlot, FitnessCertificate, InductionDecision, JobCard,
    OptimizationRun, Schedule, Shift, StatusAudit, Trainset,
};

use super::{Context, FleetStore, StoreError, TrainsetPatch};

#[derive(Default)]
struct Tables {
    trainsets: HashMap<String, Trainset>,
    certificates: HashMap<String, FitnessCertificate>,
    job_cards: HashMap<String, JobCard>,
    branding: HashMap<String, BrandingRecord>,
    cleaning_slots: HashMap<String, CleaningSlot>,
    schedules: Vec<Schedule>,
    decisions: Vec<InductionDecision>,
    runs: HashMap<String, OptimizationRun>,
    audits: Vec<StatusAudit>,
    idempotency_keys: HashSet<String>,
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

impl FleetStore for MemoryStore {
    fn snapshot(&self, date: NaiveDate, shift: Shift) -> Result<Context, StoreError> {
        let tables = self.read()?;
        let mut trainsets: Vec<Trainset> = tables.trainsets.values().cloned().collect();
        trainsets.sort_by(|a, b| a.id.cmp(&b.id));
        let mut certificates: Vec<FitnessCertificate> =
            tables.certificates.values().cloned().collect();
        certificates.sort_by(|a, b| a.id.cmp(&b.id));
        let mut job_cards: Vec<JobCard> = tables.job_cards.values().cloned().collect();
        job_cards.sort_by(|a, b| a.id.cmp(&b.id));
        let mut branding: Vec<BrandingRecord> = tables.branding.values().cloned().collect();
        branding.sort_by(|a, b| a.id.cmp(&b.id));
        let mut cleaning_slots: Vec<CleaningSlot> =
            tables.cleaning_slots.values().cloned().collect();
        cleaning_slots.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(Context {
            date,
            shift,
            taken_at: Utc::now(),
            trainsets,
            certificates,
            job_cards,
            branding,
            cleaning_slots,
            schedules: tables.schedules.clone(),
        })
    }

    fn list_trainsets(&self) -> Result<Vec<Trainset>, StoreError> {
        let tables = self.read()?;
        let mut out: Vec<Trainset> = tables.trainsets.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn get_trainset(&self, id: &str) -> Result<Trainset, StoreError> {
        self.read()?
            .trainsets
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "trainset",
                id: id.to_string(),
            })
    }

    fn upsert_trainset(&self, trainset: &Trainset) -> Result<(), StoreError> {
        self.write()?
            .trainsets
            .insert(trainset.id.clone(), trainset.clone());
        Ok(())
    }

    fn patch_trainset(
        &self,
        id: &str,
        patch: &TrainsetPatch,
        expected_version: Option<u64>,
    ) -> Result<Trainset, StoreError> {
        let mut tables = self.write()?;
        let trainset = tables
            .trainsets
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "trainset",
                id: id.to_string(),
            })?;
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
        patch.apply(trainset);
        Ok(trainset.clone())
    }

    fn list_certificates(&self) -> Result<Vec<FitnessCertificate>, StoreError> {
        let tables = self.read()?;
        let mut out: Vec<FitnessCertificate> = tables.certificates.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn upsert_certificate(&self, cert: &FitnessCertificate) -> Result<(), StoreError> {
        self.write()?
            .certificates
            .insert(cert.id.clone(), cert.clone());
        Ok(())
    }

    fn list_job_cards(&self) -> Result<Vec<JobCard>, StoreError> {
        let tables = self.read()?;
        let mut out: Vec<JobCard> = tables.job_cards.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn get_job_card(&self, id: &str) -> Result<JobCard, StoreError> {
        self.read()?
            .job_cards
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "job_card",
                id: id.to_string(),
            })
    }

    fn upsert_job_card(&self, card: &JobCard) -> Result<(), StoreError> {
        self.write()?.job_cards.insert(card.id.clone(), card.clone());
        Ok(())
    }

    fn list_branding(&self) -> Result<Vec<BrandingRecord>, StoreError> {
        let tables = self.read()?;
        let mut out: Vec<BrandingRecord> = tables.branding.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn upsert_branding(&self, record: &BrandingRecord) -> Result<(), StoreError> {
        self.write()?
            .branding
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn list_cleaning_slots(&self) -> Result<Vec<CleaningSlot>, StoreError> {
        let tables = self.read()?;
        let mut out: Vec<CleaningSlot> = tables.cleaning_slots.values().cloned().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn upsert_cleaning_slot(&self, slot: &CleaningSlot) -> Result<(), StoreError> {
        self.write()?
            .cleaning_slots
            .insert(slot.id.clone(), slot.clone());
        Ok(())
    }

    fn append_schedule(&self, schedule: &Schedule) -> Result<(), StoreError> {
        self.write()?.schedules.push(schedule.clone());
        Ok(())
    }

    fn list_schedules(&self) -> Result<Vec<Schedule>, StoreError> {
        Ok(self.read()?.schedules.clone())
    }

    fn append_decision(&self, decision: &InductionDecision) -> Result<(), StoreError> {
        self.write()?.decisions.push(decision.clone());
        Ok(())
    }

    fn get_decision(&self, id: &str) -> Result<InductionDecision, StoreError> {
        self.read()?
            .decisions
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "decision",
                id: id.to_string(),
            })
    }

    fn list_decisions(&self, limit: usize) -> Result<Vec<InductionDecision>, StoreError> {
        Ok(self
            .read()?
            .decisions
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    fn put_run(&self, run: &OptimizationRun) -> Result<(), StoreError> {
        self.write()?.runs.insert(run.id.clone(), run.clone());
        Ok(())
    }

    fn get_run(&self, id: &str) -> Result<OptimizationRun, StoreError> {
        self.read()?
            .runs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "optimization_run",
                id: id.to_string(),
            })
    }

    fn list_runs(&self, limit: usize) -> Result<Vec<OptimizationRun>, StoreError> {
        let tables = self.read()?;
        let mut out: Vec<OptimizationRun> = tables.runs.values().cloned().collect();
        out.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        out.truncate(limit);
        Ok(out)
    }

    fn append_audit(&self, audit: &StatusAudit) -> Result<(), StoreError> {
        self.write()?.audits.push(audit.clone());
        Ok(())
    }

    fn list_audits(&self, limit: usize) -> Result<Vec<StatusAudit>, StoreError> {
        Ok(self
            .read()?
            .audits
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    fn claim_idempotency_key(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.write()?.idempotency_keys.insert(key.to_string()))
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}
