//! Context fingerprinting for decision audits
//!
//! Produces a deterministic md5 digest over the ids and observed mutable
//! fields of every entity in a context snapshot. Two snapshots with the same
//! entity state fingerprint identically regardless of when they were taken.

use std::fmt::Write as _;

use crate::store::Context;

/// Deterministic fingerprint of a context snapshot.
///
/// Covers entity ids plus the mutable fields the decision engine actually
/// reads. Collections are walked in the store's sorted-id order, so the
/// digest is stable across runs.
pub fn inputs_hash(ctx: &Context) -> String {
    let mut canon = String::new();
    let _ = write!(canon, "date:{};shift:{};", ctx.date, ctx.shift.short_code());

    for t in &ctx.trainsets {
        let _ = write!(
            canon,
            "t:{}|{}|{}|{:.1}|{:.1}|{}|{}|{}|{}|{}|{};",
            t.id,
            t.status.short_code(),
            t.location,
            t.current_mileage,
            t.total_mileage,
            stamp(&t.last_maintenance_at),
            stamp(&t.next_maintenance_due_at),
            stamp(&t.last_cleaning_at),
            stamp(&t.fitness_expiry_at),
            t.is_active,
            t.version,
        );
    }
    for c in &ctx.certificates {
        let _ = write!(
            canon,
            "c:{}|{}|{}|{};",
            c.id,
            c.trainset_id,
            c.status,
            c.expires_at.timestamp(),
        );
    }
    for j in &ctx.job_cards {
        let _ = write!(
            canon,
            "j:{}|{}|{}|{};",
            j.id,
            j.trainset_id.as_deref().unwrap_or("-"),
            j.status,
            j.priority,
        );
    }
    for b in &ctx.branding {
        let _ = write!(
            canon,
            "b:{}|{}|{}|{:.1}|{:.1};",
            b.id, b.trainset_id, b.priority, b.target_hours_per_day, b.delivered_hours,
        );
    }
    for s in &ctx.cleaning_slots {
        let _ = write!(
            canon,
            "s:{}|{}|{}|{};",
            s.id,
            s.bay,
            s.capacity,
            s.assigned_trainset_ids.join("+"),
        );
    }

    format!("{:x}", md5::compute(canon.as_bytes()))
}

fn stamp(at: &Option<chrono::DateTime<chrono::Utc>>) -> i64 {
    at.map_or(0, |a| a.timestamp())
}
