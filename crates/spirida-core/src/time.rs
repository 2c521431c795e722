//! Timestamps and clocks.
//!
//! All spirida timestamps are `f64` seconds since the Unix epoch. Operations
//! that depend on elapsed time take `now` explicitly; the [`Clock`] trait is
//! the seam through which long-lived owners obtain it.
//!
//! ISO-8601 rendering uses Howard Hinnant's civil_from_days algorithm.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds per hour, for the cycle-based reclamation policies.
pub const SECS_PER_HOUR: f64 = 3600.0;

/// Source of "now" for orchestrators and other long-lived owners.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        now_secs()
    }
}

/// Hand-driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, t: f64) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = t;
    }

    /// Move the clock forward by `secs` and return the new time.
    pub fn advance(&self, secs: f64) -> f64 {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += secs;
        *now
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Current UTC time as fractional Unix seconds.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Hours elapsed from `since` to `now`, never negative.
pub fn hours_since(since: f64, now: f64) -> f64 {
    (now - since).max(0.0) / SECS_PER_HOUR
}

/// Position within a repeating cycle of `cycle_hours`, in `[0, 1)`.
pub fn cycle_phase(since: f64, now: f64, cycle_hours: f64) -> f64 {
    (hours_since(since, now) / cycle_hours).rem_euclid(1.0)
}

/// Convert Unix seconds to ISO-8601 UTC string (sub-second part dropped).
pub fn unix_to_iso8601(secs: f64) -> String {
    let secs = secs.max(0.0) as u64;
    let days = (secs / 86400) as i64;
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (y, m, d) = civil_from_days(days);
    format!("{y:04}-{m:02}-{d:02}T{hours:02}:{minutes:02}:{seconds:02}Z")
}

/// Howard Hinnant's civil_from_days: Unix epoch days → (year, month, day).
fn civil_from_days(days: i64) -> (i64, u64, u64) {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}
