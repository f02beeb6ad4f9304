//! Status-loop regression: cleaning rotation, idempotence, graph compliance

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use railmind::bus::EventBus;
use railmind::clock::ManualClock;
use railmind::config::{BusConfig, DepotInfo, StatusLoopConfig};
use railmind::status_loop::{transitions, StatusLoop};
use railmind::store::{FleetStore, MemoryStore};
use railmind::types::{
    CertificateStatus, EventKind, FitnessCertificate, Trainset, TrainsetStatus,
};

fn make_trainset(i: usize, status: TrainsetStatus) -> Trainset {
    Trainset {
        id: format!("ts-{i:03}"),
        number: format!("TS-{i:03}"),
        manufacturer: "Alstom".to_string(),
        model: "Metropolis".to_string(),
        year_built: 2018,
        capacity: 975,
        max_speed_kmh: 80.0,
        status,
        depot: "Muttom".to_string(),
        location: "Muttom".to_string(),
        current_mileage: 1_000.0,
        total_mileage: 150_000.0,
        operational_hours: 12_000.0,
        last_maintenance_at: None,
        next_maintenance_due_at: None,
        last_cleaning_at: None,
        next_cleaning_at: None,
        fitness_expiry_at: None,
        is_active: true,
        version: 0,
    }
}

fn valid_cert(i: usize, days: i64) -> FitnessCertificate {
    FitnessCertificate {
        id: format!("fc-{i:03}"),
        trainset_id: format!("ts-{i:03}"),
        issued_at: Utc::now() - Duration::days(200),
        expires_at: Utc::now() + Duration::days(days),
        status: CertificateStatus::Valid,
        issuing_authority: "CMRS".to_string(),
    }
}

fn build_loop(
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
) -> (Arc<StatusLoop>, Arc<EventBus>) {
    let bus = Arc::new(EventBus::new(&BusConfig::default()));
    let status_loop = Arc::new(StatusLoop::new(
        store,
        bus.clone(),
        clock,
        StatusLoopConfig::default(),
        DepotInfo::default(),
    ));
    (status_loop, bus)
}

/// Scenario: 20 AVAILABLE trainsets, none cleaned in 48h, clock at 22:00.
/// One rotation sends ~30% to cleaning; the 00:00 sweep brings them back,
/// with paired audit reasons.
#[test]
fn cleaning_rotation() {
    let store = Arc::new(MemoryStore::new());
    let night = Utc.with_ymd_and_hms(2026, 2, 1, 22, 0, 0).unwrap();
    for i in 0..20 {
        let mut ts = make_trainset(i, TrainsetStatus::Available);
        ts.last_cleaning_at = Some(night - Duration::hours(48));
        store.upsert_trainset(&ts).unwrap();
        store.upsert_certificate(&valid_cert(i, 90)).unwrap();
    }
    let clock = Arc::new(ManualClock::new(night));
    let (status_loop, _bus) = build_loop(store.clone(), clock.clone());

    let report = status_loop.cleaning_start();
    let cleaning: Vec<Trainset> = store
        .list_trainsets()
        .unwrap()
        .into_iter()
        .filter(|t| t.status == TrainsetStatus::Cleaning)
        .collect();
    // 30% of 20, allowing ±1 around the quota
    assert!((5..=7).contains(&cleaning.len()), "got {}", cleaning.len());
    assert_eq!(report.transitions.len(), cleaning.len());
    for ts in &cleaning {
        assert_eq!(ts.last_cleaning_at, Some(night));
        assert_eq!(ts.next_cleaning_at, Some(night + Duration::hours(24)));
    }

    // Second trigger within the same window is a no-op
    let again = status_loop.cleaning_start();
    assert!(again.transitions.is_empty());

    // 00:00: everyone returns
    clock.set(Utc.with_ymd_and_hms(2026, 2, 2, 0, 0, 0).unwrap());
    let end_report = status_loop.cleaning_end();
    assert_eq!(end_report.transitions.len(), cleaning.len());
    assert!(store
        .list_trainsets()
        .unwrap()
        .iter()
        .all(|t| t.status == TrainsetStatus::Available));

    // Audit rows pair up, with matching reasons
    let audits = store.list_audits(100).unwrap();
    let starts = audits
        .iter()
        .filter(|a| a.reason == "Scheduled daily cleaning")
        .count();
    let ends = audits
        .iter()
        .filter(|a| a.reason == "Cleaning completed")
        .count();
    assert_eq!(starts, cleaning.len());
    assert_eq!(ends, cleaning.len());
}

/// Law: two hourly sweeps back-to-back with no external changes produce the
/// same fleet state as one.
#[test]
fn sweep_idempotence() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
    for i in 0..12 {
        let mut ts = make_trainset(i, TrainsetStatus::Available);
        // A third are overdue for maintenance
        if i % 3 == 0 {
            ts.next_maintenance_due_at = Some(now - Duration::hours(2));
        } else {
            ts.next_maintenance_due_at = Some(now + Duration::days(20));
        }
        store.upsert_trainset(&ts).unwrap();
        // A quarter have expired fitness
        let days = if i % 4 == 0 { -1 } else { 60 };
        store.upsert_certificate(&valid_cert(i, days)).unwrap();
    }
    let clock = Arc::new(ManualClock::new(now));
    let (status_loop, _bus) = build_loop(store.clone(), clock);

    let first = status_loop.sweep();
    assert!(first.changed_fleet());
    let state_after_first: Vec<(String, TrainsetStatus)> = store
        .list_trainsets()
        .unwrap()
        .into_iter()
        .map(|t| (t.id, t.status))
        .collect();

    let second = status_loop.sweep();
    assert!(second.transitions.is_empty(), "second sweep must be a no-op");
    let state_after_second: Vec<(String, TrainsetStatus)> = store
        .list_trainsets()
        .unwrap()
        .into_iter()
        .map(|t| (t.id, t.status))
        .collect();
    assert_eq!(state_after_first, state_after_second);
}

/// Property: everything a sweep applies is an edge of the transition graph.
#[test]
fn sweep_transitions_stay_in_graph() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
    let statuses = [
        TrainsetStatus::Available,
        TrainsetStatus::InService,
        TrainsetStatus::Maintenance,
        TrainsetStatus::Cleaning,
        TrainsetStatus::OutOfOrder,
        TrainsetStatus::Inspection,
    ];
    for i in 0..24 {
        let mut ts = make_trainset(i, statuses[i % statuses.len()]);
        if i % 2 == 0 {
            ts.next_maintenance_due_at = Some(now - Duration::hours(1));
        }
        if i % 5 == 0 {
            ts.last_maintenance_at = Some(now - Duration::hours(3));
            ts.next_maintenance_due_at = Some(now + Duration::days(30));
        }
        store.upsert_trainset(&ts).unwrap();
        let days = if i % 3 == 0 { -2 } else { 45 };
        store.upsert_certificate(&valid_cert(i, days)).unwrap();
    }
    let clock = Arc::new(ManualClock::new(now));
    let (status_loop, _bus) = build_loop(store.clone(), clock);

    let report = status_loop.sweep();
    for audit in &report.transitions {
        assert!(
            transitions::allowed(audit.from_status, audit.to_status),
            "sweep applied {:?} -> {:?}",
            audit.from_status,
            audit.to_status
        );
    }
    assert!(report.errors.is_empty());
}

/// Fitness expiry forces OUT_OF_ORDER; renewal brings the trainset back.
#[test]
fn fitness_expiry_and_renewal_cycle() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap();
    let ts = make_trainset(0, TrainsetStatus::InService);
    store.upsert_trainset(&ts).unwrap();
    store.upsert_certificate(&valid_cert(0, -1)).unwrap();

    let clock = Arc::new(ManualClock::new(now));
    let (status_loop, bus) = build_loop(store.clone(), clock);
    let subscription = bus.subscribe(&[EventKind::TrainsetStatusChanged]);

    status_loop.sweep();
    assert_eq!(
        store.get_trainset("ts-000").unwrap().status,
        TrainsetStatus::OutOfOrder
    );
    let event = subscription.try_next().unwrap();
    assert_eq!(event.payload["to"], "OUT_OF_ORDER");

    // Renewal observed
    store.upsert_certificate(&valid_cert(0, 365)).unwrap();
    status_loop.sweep();
    assert_eq!(
        store.get_trainset("ts-000").unwrap().status,
        TrainsetStatus::Available
    );
}
