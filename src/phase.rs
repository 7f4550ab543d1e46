//! Per-second cycle arithmetic.
//!
//! Every cycle starts at a wall-clock second boundary. The busy phase runs
//! from that boundary for `busy_budget_micros` and the rest of the second is
//! spent sleeping.

use crate::error::ConfigError;
use crate::timing::{elapsed_micros, Timestamp, MICROS_PER_SEC};

/// Fraction of each second spent busy, always in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Utilization(f64);

impl Utilization {
    pub const DEFAULT_PERCENT: f64 = 50.0;

    pub fn from_fraction(fraction: f64) -> Result<Self, ConfigError> {
        if !fraction.is_finite() || fraction < 0.0 {
            return Err(ConfigError::InvalidPercent(format!("{}", fraction * 100.0)));
        }
        if fraction >= 1.0 {
            return Err(ConfigError::PercentTooLarge);
        }
        Ok(Self(fraction))
    }

    pub fn from_percent(percent: f64) -> Result<Self, ConfigError> {
        Self::from_fraction(percent / 100.0)
    }

    /// Parse a percentage string such as `"37.5"`. The whole string must be
    /// numeric.
    pub fn parse_percent(text: &str) -> Result<Self, ConfigError> {
        let percent: f64 = text
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPercent(text.to_string()))?;
        if !percent.is_finite() || percent < 0.0 {
            return Err(ConfigError::InvalidPercent(text.to_string()));
        }
        Self::from_percent(percent)
    }

    pub fn fraction(self) -> f64 {
        self.0
    }

    pub fn percent(self) -> f64 {
        self.0 * 100.0
    }

    pub fn busy_budget_micros(self) -> i64 {
        busy_budget_micros(self.0)
    }
}

impl Default for Utilization {
    fn default() -> Self {
        Self(Self::DEFAULT_PERCENT / 100.0)
    }
}

pub fn busy_budget_micros(fraction: f64) -> i64 {
    (MICROS_PER_SEC as f64 * fraction).round() as i64
}

/// Microseconds until the next second boundary.
///
/// Sitting exactly on a boundary yields a full second, never zero: the
/// cycle that boundary opened is treated as already in progress.
pub fn idle_sleep_micros(now: Timestamp) -> i64 {
    MICROS_PER_SEC - now.micros
}

/// Instant at which the busy phase of the cycle following `now` ends.
///
/// `now` is the timestamp taken before the idle sleep, so the cycle starts
/// at the top of `now.secs + 1`.
pub fn busy_phase_end(now: Timestamp, budget_micros: i64) -> Timestamp {
    Timestamp::new(now.secs + 1, budget_micros)
}

/// The second a cycle's busy phase belongs to, for a cycle whose idle sleep
/// started at `now`.
pub fn cycle_second(now: Timestamp) -> i64 {
    now.secs + 1
}

/// A cycle misses its deadline when the busy phase is still running after
/// the second it was meant to finish in. One overrun is one miss, however
/// long it lasted.
///
/// Compared against the cycle's own second rather than the busy end, which
/// normalizes into the following second for a full-second budget.
pub fn missed_deadline(cycle_second: i64, sampled: Timestamp) -> bool {
    sampled.secs > cycle_second
}

/// Whether the busy phase ending at `busy_end` is over at `now`.
pub fn busy_phase_over(busy_end: Timestamp, now: Timestamp) -> bool {
    elapsed_micros(now, busy_end) >= 0
}
