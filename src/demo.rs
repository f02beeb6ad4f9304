//! Demo fleet seeding for local runs
//!
//! Populates a fresh store with a plausible 25-trainset metro fleet:
//! long-valid certificates for most, a few expiring or blocked units, a
//! couple of branding campaigns, and one overnight cleaning bay. Used by
//! `railmind --seed-demo` so the command surface has something to plan
//! against out of the box.

use chrono::{Duration, Utc};
use tracing::info;

use crate::store::{FleetStore, StoreError};
use crate::types::{
    BrandingRecord, CertificateStatus, CleaningSlot, FitnessCertificate, JobCard,
    JobCardPriority, JobCardStatus, Trainset, TrainsetStatus,
};

/// Fleet size seeded by `seed_fleet`.
pub const DEMO_FLEET_SIZE: usize = 25;

/// Seed a demo fleet. Idempotent on id: re-seeding overwrites in place.
pub fn seed_fleet(store: &dyn FleetStore) -> Result<(), StoreError> {
    let now = Utc::now();

    for i in 0..DEMO_FLEET_SIZE {
        let id = format!("ts-{:03}", i + 1);
        let trainset = Trainset {
            id: id.clone(),
            number: format!("TS-{:03}", i + 1),
            manufacturer: "Alstom".to_string(),
            model: "Metropolis".to_string(),
            year_built: 2017 + (i as i32 % 6),
            capacity: 975,
            max_speed_kmh: 80.0,
            status: TrainsetStatus::Available,
            depot: "Muttom".to_string(),
            location: if i % 7 == 0 {
                "Aluva Terminal".to_string()
            } else {
                "Muttom".to_string()
            },
            current_mileage: 950.0 + (i as f64) * 7.5,
            total_mileage: 120_000.0 + (i as f64) * 4_000.0,
            operational_hours: 11_000.0 + (i as f64) * 350.0,
            last_maintenance_at: Some(now - Duration::days(12 + (i as i64 % 10))),
            next_maintenance_due_at: Some(now + Duration::days(18 + (i as i64 % 20))),
            last_cleaning_at: Some(now - Duration::days(i as i64 % 9)),
            next_cleaning_at: None,
            fitness_expiry_at: None,
            is_active: true,
            version: 0,
        };
        store.upsert_trainset(&trainset)?;

        // Most certificates healthy; a couple expiring, one expired
        let expiry_days = match i {
            3 => -2,
            7 => 5,
            11 => 12,
            _ => 60 + (i as i64 * 3),
        };
        store.upsert_certificate(&FitnessCertificate {
            id: format!("fc-{:03}", i + 1),
            trainset_id: id.clone(),
            issued_at: now - Duration::days(300),
            expires_at: now + Duration::days(expiry_days),
            status: CertificateStatus::Valid,
            issuing_authority: "CMRS".to_string(),
        })?;
    }

    // Two blocked trainsets and some routine work
    let cards = [
        ("jc-001", "ts-005", JobCardPriority::Critical, "Traction converter fault"),
        ("jc-002", "ts-014", JobCardPriority::High, "Door interlock intermittent"),
        ("jc-003", "ts-002", JobCardPriority::Low, "Cab seat adjustment"),
        ("jc-004", "ts-009", JobCardPriority::Medium, "HVAC filter swap"),
    ];
    for (id, trainset_id, priority, title) in cards {
        store.upsert_job_card(&JobCard {
            id: id.to_string(),
            trainset_id: Some(trainset_id.to_string()),
            external_id: None,
            title: title.to_string(),
            description: String::new(),
            priority,
            status: JobCardStatus::Open,
            category: "maintenance".to_string(),
            estimated_hours: Some(4.0),
            actual_hours: None,
            scheduled_at: None,
            due_at: Some(now + Duration::days(3)),
            completed_at: None,
        })?;
    }

    // Branding campaigns, one running a deficit
    store.upsert_branding(&BrandingRecord {
        id: "br-001".to_string(),
        trainset_id: "ts-006".to_string(),
        campaign: "CityBank Platinum".to_string(),
        priority: 85,
        target_hours_per_day: 14.0,
        delivered_hours: 40.0,
        contract_start: now - Duration::days(15),
        contract_end: now + Duration::days(45),
    })?;
    store.upsert_branding(&BrandingRecord {
        id: "br-002".to_string(),
        trainset_id: "ts-012".to_string(),
        campaign: "Spice Air".to_string(),
        priority: 40,
        target_hours_per_day: 10.0,
        delivered_hours: 150.0,
        contract_start: now - Duration::days(15),
        contract_end: now + Duration::days(75),
    })?;

    // One overnight cleaning bay
    store.upsert_cleaning_slot(&CleaningSlot {
        id: "slot-b1".to_string(),
        bay: "B1".to_string(),
        starts_at: now,
        ends_at: now + Duration::hours(8),
        capacity: 6,
        assigned_trainset_ids: Vec::new(),
    })?;

    info!(fleet = DEMO_FLEET_SIZE, "Demo fleet seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn seeds_a_plannable_fleet() {
        let store = MemoryStore::new();
        seed_fleet(&store).unwrap();

        let trainsets = store.list_trainsets().unwrap();
        assert_eq!(trainsets.len(), DEMO_FLEET_SIZE);
        assert_eq!(store.list_certificates().unwrap().len(), DEMO_FLEET_SIZE);
        assert!(!store.list_job_cards().unwrap().is_empty());
        assert!(!store.list_branding().unwrap().is_empty());
    }

    #[test]
    fn reseeding_is_idempotent() {
        let store = MemoryStore::new();
        seed_fleet(&store).unwrap();
        seed_fleet(&store).unwrap();
        assert_eq!(store.list_trainsets().unwrap().len(), DEMO_FLEET_SIZE);
    }
}
