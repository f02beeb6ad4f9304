//! Clock & calendar: wall-clock abstraction and daily trigger arithmetic
//!
//! The status loop never calls `Utc::now()` directly — it reads time through
//! the [`Clock`] trait so tests can drive the cleaning windows with a
//! [`ManualClock`].

use chrono::{DateTime, Duration, Timelike, Utc};
use std::sync::RwLock;

/// Wall-clock source.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock with a settable instant.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Move the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = instant;
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.write() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.read().map(|g| *g).unwrap_or_else(|_| Utc::now())
    }
}

/// Seconds into the local day for a UTC instant at the given offset.
fn local_day_seconds(now_utc: DateTime<Utc>, utc_offset_minutes: i32) -> i64 {
    let local = now_utc + Duration::minutes(i64::from(utc_offset_minutes));
    i64::from(local.hour()) * 3_600 + i64::from(local.minute()) * 60 + i64::from(local.second())
}

/// Duration until the next local-time occurrence of `HH:MM`, given a UTC
/// instant and the depot's UTC offset in minutes.
///
/// Returns zero when the trigger is exactly now; otherwise a positive
/// duration not exceeding 24h.
pub fn until_next_daily(
    now_utc: DateTime<Utc>,
    hour: u32,
    minute: u32,
    utc_offset_minutes: i32,
) -> Duration {
    let seconds_today = local_day_seconds(now_utc, utc_offset_minutes);
    let target = i64::from(hour) * 3_600 + i64::from(minute) * 60;
    let delta = if target >= seconds_today {
        target - seconds_today
    } else {
        86_400 - seconds_today + target
    };
    Duration::seconds(delta)
}

/// Whether the local wall-clock is currently inside the `[start, end)` daily
/// window. Handles windows that wrap midnight (e.g. 22:00 – 00:00).
pub fn in_daily_window(
    now_utc: DateTime<Utc>,
    start: (u32, u32),
    end: (u32, u32),
    utc_offset_minutes: i32,
) -> bool {
    let minutes = local_day_seconds(now_utc, utc_offset_minutes) / 60;
    let s = i64::from(start.0 * 60 + start.1);
    let e = i64::from(end.0 * 60 + end.1);
    if s == e {
        false
    } else if s < e {
        minutes >= s && minutes < e
    } else {
        // wraps midnight
        minutes >= s || minutes < e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::hours(3));
        assert_eq!(clock.now(), start + Duration::hours(3));
    }

    #[test]
    fn next_daily_same_day() {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 20, 0, 0).unwrap();
        let d = until_next_daily(now, 22, 0, 0);
        assert_eq!(d, Duration::hours(2));
    }

    #[test]
    fn next_daily_wraps_past_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 23, 0, 0).unwrap();
        let d = until_next_daily(now, 22, 0, 0);
        assert_eq!(d, Duration::hours(23));
    }

    #[test]
    fn next_daily_respects_offset() {
        // 16:30 UTC at +05:30 is 22:00 local
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 16, 0, 0).unwrap();
        let d = until_next_daily(now, 22, 0, 330);
        assert_eq!(d, Duration::minutes(30));
    }

    #[test]
    fn window_wrapping_midnight() {
        let at = |h, m| Utc.with_ymd_and_hms(2026, 2, 1, h, m, 0).unwrap();
        assert!(in_daily_window(at(23, 0), (22, 0), (0, 0), 0));
        assert!(in_daily_window(at(22, 0), (22, 0), (0, 0), 0));
        assert!(!in_daily_window(at(0, 0), (22, 0), (0, 0), 0));
        assert!(!in_daily_window(at(12, 0), (22, 0), (0, 0), 0));
    }
}
