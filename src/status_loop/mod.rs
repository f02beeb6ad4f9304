//! Autonomous Status Loop — rule-driven fleet state maintenance
//!
//! A single supervisor with three triggers:
//!
//! - **Hourly sweep**: applies the transition table from certificate expiry,
//!   maintenance due dates, and completion signals, and raises maintenance
//!   alerts for upcoming due dates.
//! - **Cleaning start** (default 22:00 local): selects ~30% of the overdue
//!   AVAILABLE trainsets at random and moves them to CLEANING.
//! - **Cleaning end** (default 00:00 local): returns every CLEANING trainset
//!   to AVAILABLE.
//!
//! Every transition writes an audit row and publishes
//! `trainset.status_changed`; refused transitions publish a
//! `system.notification`. A per-trainset failure never aborts a sweep, and
//! sweeps are idempotent within their logical window.

pub mod transitions;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::clock::{self, Clock};
use crate::config::defaults::{
    CERTIFICATE_ALERT_WINDOW_DAYS, CLEANING_OVERDUE_HOURS, MAINTENANCE_ALERT_WINDOW_HOURS,
    SWEEP_INTERVAL_SECS,
};
use crate::config::{DepotInfo, StatusLoopConfig};
use crate::store::{FleetStore, TrainsetPatch};
use crate::types::{
    EventKind, FitnessCertificate, StatusAudit, SweepReport, Trainset, TrainsetStatus,
};

use transitions::{
    REASON_CLEANING_DONE, REASON_DAILY_CLEANING, REASON_FITNESS_EXPIRED, REASON_FITNESS_RENEWED,
    REASON_MAINTENANCE_DONE, REASON_MAINTENANCE_DUE,
};

/// Observable loop counters for the status endpoint.
#[derive(Debug, Default)]
pub struct LoopStats {
    pub sweeps_completed: AtomicU64,
    pub transitions_applied: AtomicU64,
    pub transitions_refused: AtomicU64,
}

/// The status loop supervisor.
pub struct StatusLoop {
    store: Arc<dyn FleetStore>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    config: StatusLoopConfig,
    depot: DepotInfo,
    stats: LoopStats,
    /// Local date of the last cleaning-start execution (window guard)
    last_cleaning_window: Mutex<Option<NaiveDate>>,
}

impl StatusLoop {
    pub fn new(
        store: Arc<dyn FleetStore>,
        bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        config: StatusLoopConfig,
        depot: DepotInfo,
    ) -> Self {
        Self {
            store,
            bus,
            clock,
            config,
            depot,
            stats: LoopStats::default(),
            last_cleaning_window: Mutex::new(None),
        }
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Run the supervisor until cancelled. Sleeps to the earliest of the
    /// next hourly tick, cleaning start, and cleaning end.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let (start_h, start_m) = StatusLoopConfig::parse_wall_time(&self.config.cleaning_start)
            .unwrap_or((22, 0));
        let (end_h, end_m) =
            StatusLoopConfig::parse_wall_time(&self.config.cleaning_end).unwrap_or((0, 0));
        info!(
            hourly = self.config.hourly_sweep,
            cleaning_start = %self.config.cleaning_start,
            cleaning_end = %self.config.cleaning_end,
            "Status loop started"
        );

        loop {
            let now = self.clock.now();
            let to_hourly = Duration::seconds(SWEEP_INTERVAL_SECS as i64);
            let to_start =
                clock::until_next_daily(now, start_h, start_m, self.depot.utc_offset_minutes);
            let to_end = clock::until_next_daily(now, end_h, end_m, self.depot.utc_offset_minutes);

            let (sleep_for, trigger) = [
                (to_hourly, Trigger::Hourly),
                (to_start, Trigger::CleaningStart),
                (to_end, Trigger::CleaningEnd),
            ]
            .into_iter()
            .min_by_key(|(d, _)| *d)
            .unwrap_or((to_hourly, Trigger::Hourly));

            // Never busy-loop when a trigger lands exactly on the tick
            let sleep_std = sleep_for
                .to_std()
                .unwrap_or(StdDuration::from_secs(1))
                .max(StdDuration::from_secs(1));
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Status loop stopping");
                    return;
                }
                () = tokio::time::sleep(sleep_std) => {}
            }

            match trigger {
                Trigger::Hourly => {
                    if self.config.hourly_sweep {
                        let report = self.sweep();
                        debug!(
                            examined = report.examined,
                            transitions = report.transitions.len(),
                            "Hourly sweep complete"
                        );
                    }
                }
                Trigger::CleaningStart => {
                    let report = self.cleaning_start();
                    debug!(transitions = report.transitions.len(), "Cleaning start complete");
                }
                Trigger::CleaningEnd => {
                    let report = self.cleaning_end();
                    debug!(transitions = report.transitions.len(), "Cleaning end complete");
                }
            }
        }
    }

    /// Hourly sweep: apply the transition table across the fleet.
    ///
    /// Idempotent: re-running against an unchanged fleet applies nothing.
    pub fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        let (trainsets, certificates) =
            match (self.store.list_trainsets(), self.store.list_certificates()) {
                (Ok(t), Ok(c)) => (t, c),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "Status sweep could not load fleet");
                    report.errors.push(e.to_string());
                    return report;
                }
            };

        for trainset in trainsets.iter().filter(|t| t.is_active) {
            report.examined += 1;
            let has_valid_certificate = certificates
                .iter()
                .filter(|c| c.trainset_id == trainset.id)
                .any(|c| c.is_valid_at(now));

            if let Some((to, reason)) = desired_transition(trainset, has_valid_certificate, now) {
                if let Err(e) = self.apply_transition(trainset, to, reason, &mut report) {
                    report
                        .errors
                        .push(format!("{}: {e}", trainset.number));
                }
            }

            self.raise_alerts(trainset, &certificates, now);
        }

        self.stats.sweeps_completed.fetch_add(1, Ordering::Relaxed);
        if report.changed_fleet() {
            info!(
                examined = report.examined,
                transitions = report.transitions.len(),
                errors = report.errors.len(),
                "Status sweep applied transitions"
            );
        }
        report
    }

    /// Nightly cleaning rotation: move ~`cleaning_selection_ratio` of the
    /// overdue AVAILABLE trainsets to CLEANING. Guarded per local date, so a
    /// re-trigger within the same window is a no-op.
    pub fn cleaning_start(&self) -> SweepReport {
        let now = self.clock.now();
        let window_date =
            (now + Duration::minutes(i64::from(self.depot.utc_offset_minutes))).date_naive();
        {
            let Ok(mut guard) = self.last_cleaning_window.lock() else {
                return SweepReport::default();
            };
            if *guard == Some(window_date) {
                debug!(%window_date, "Cleaning rotation already ran for this window");
                return SweepReport::default();
            }
            *guard = Some(window_date);
        }

        let mut report = SweepReport::default();
        let trainsets = match self.store.list_trainsets() {
            Ok(t) => t,
            Err(e) => {
                report.errors.push(e.to_string());
                return report;
            }
        };

        let cutoff = now - Duration::hours(CLEANING_OVERDUE_HOURS);
        let mut candidates: Vec<&Trainset> = trainsets
            .iter()
            .filter(|t| {
                t.is_active
                    && t.status == TrainsetStatus::Available
                    && t.last_cleaning_at.map_or(true, |at| at < cutoff)
            })
            .collect();
        report.examined = candidates.len();

        let quota = (candidates.len() as f64 * self.config.cleaning_selection_ratio).round()
            as usize;
        let mut rng = rand::rngs::StdRng::from_entropy();
        candidates.shuffle(&mut rng);

        for trainset in candidates.into_iter().take(quota) {
            let patch = TrainsetPatch {
                status: Some(TrainsetStatus::Cleaning),
                last_cleaning_at: Some(now),
                next_cleaning_at: Some(now + Duration::hours(24)),
                ..TrainsetPatch::default()
            };
            if let Err(e) =
                self.apply_patched_transition(trainset, patch, REASON_DAILY_CLEANING, &mut report)
            {
                report.errors.push(format!("{}: {e}", trainset.number));
            }
        }

        info!(
            selected = report.transitions.len(),
            examined = report.examined,
            "Nightly cleaning rotation"
        );
        report
    }

    /// Cleaning window end: every CLEANING trainset returns to AVAILABLE.
    pub fn cleaning_end(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let trainsets = match self.store.list_trainsets() {
            Ok(t) => t,
            Err(e) => {
                report.errors.push(e.to_string());
                return report;
            }
        };

        for trainset in trainsets
            .iter()
            .filter(|t| t.is_active && t.status == TrainsetStatus::Cleaning)
        {
            report.examined += 1;
            if let Err(e) = self.apply_transition(
                trainset,
                TrainsetStatus::Available,
                REASON_CLEANING_DONE,
                &mut report,
            ) {
                report.errors.push(format!("{}: {e}", trainset.number));
            }
        }
        report
    }

    fn apply_transition(
        &self,
        trainset: &Trainset,
        to: TrainsetStatus,
        reason: &str,
        report: &mut SweepReport,
    ) -> Result<(), crate::store::StoreError> {
        self.apply_patched_transition(trainset, TrainsetPatch::status(to), reason, report)
    }

    /// Validate against the transition graph, write, audit, publish.
    fn apply_patched_transition(
        &self,
        trainset: &Trainset,
        patch: TrainsetPatch,
        reason: &str,
        report: &mut SweepReport,
    ) -> Result<(), crate::store::StoreError> {
        let Some(to) = patch.status else {
            return Ok(());
        };
        if !transitions::allowed(trainset.status, to) {
            if trainset.status != to {
                self.stats.transitions_refused.fetch_add(1, Ordering::Relaxed);
                warn!(
                    trainset = %trainset.number,
                    from = %trainset.status,
                    to = %to,
                    "Refused status transition outside the graph"
                );
                self.bus.publish(
                    EventKind::SystemNotification,
                    json!({
                        "message": format!(
                            "Refused transition {} -> {} for trainset {}",
                            trainset.status, to, trainset.number
                        ),
                        "reason": reason,
                    }),
                );
            }
            return Ok(());
        }

        self.store
            .patch_trainset(&trainset.id, &patch, Some(trainset.version))?;

        let audit = StatusAudit {
            id: uuid::Uuid::new_v4().to_string(),
            trainset_id: trainset.id.clone(),
            from_status: trainset.status,
            to_status: to,
            reason: reason.to_string(),
            occurred_at: self.clock.now(),
        };
        self.store.append_audit(&audit)?;
        self.stats.transitions_applied.fetch_add(1, Ordering::Relaxed);

        self.bus.publish(
            EventKind::TrainsetStatusChanged,
            json!({
                "trainset_id": trainset.id,
                "from": trainset.status,
                "to": to,
                "reason": reason,
            }),
        );
        report.transitions.push(audit);
        Ok(())
    }

    /// Maintenance and certificate-expiry alerts for upcoming deadlines.
    fn raise_alerts(
        &self,
        trainset: &Trainset,
        certificates: &[FitnessCertificate],
        now: DateTime<Utc>,
    ) {
        if let Some(due) = trainset.next_maintenance_due_at {
            let hours = (due - now).num_hours();
            if (0..=MAINTENANCE_ALERT_WINDOW_HOURS).contains(&hours) {
                self.bus.publish(
                    EventKind::MaintenanceAlert,
                    json!({
                        "alert": "maintenance_due_soon",
                        "trainset_id": trainset.id,
                        "due_at": due,
                        "hours_remaining": hours,
                    }),
                );
            }
        }
        for cert in certificates
            .iter()
            .filter(|c| c.trainset_id == trainset.id && c.is_valid_at(now))
        {
            let days = cert.days_to_expiry(now);
            if (0..=CERTIFICATE_ALERT_WINDOW_DAYS).contains(&days) {
                self.bus.publish(
                    EventKind::MaintenanceAlert,
                    json!({
                        "alert": "certificate_expiring",
                        "trainset_id": trainset.id,
                        "expires_at": cert.expires_at,
                        "days_remaining": days,
                    }),
                );
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Hourly,
    CleaningStart,
    CleaningEnd,
}

/// Transition the hourly sweep wants for a trainset, if any.
fn desired_transition(
    trainset: &Trainset,
    has_valid_certificate: bool,
    now: DateTime<Utc>,
) -> Option<(TrainsetStatus, &'static str)> {
    use TrainsetStatus::{Available, InService, Maintenance, OutOfOrder};

    if !has_valid_certificate {
        if trainset.status != OutOfOrder {
            return Some((OutOfOrder, REASON_FITNESS_EXPIRED));
        }
        return None;
    }

    match trainset.status {
        OutOfOrder => Some((Available, REASON_FITNESS_RENEWED)),
        Available | InService => trainset
            .next_maintenance_due_at
            .filter(|due| *due <= now)
            .map(|_| (Maintenance, REASON_MAINTENANCE_DUE)),
        Maintenance => {
            let today = now.date_naive();
            let maintained_today = trainset
                .last_maintenance_at
                .is_some_and(|at| at.date_naive() >= today);
            let due_in_future = trainset
                .next_maintenance_due_at
                .is_some_and(|due| due > now);
            (maintained_today && due_in_future).then_some((Available, REASON_MAINTENANCE_DONE))
        }
        _ => None,
    }
}
