use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ConfigError;
use crate::timing::{elapsed_micros, Timestamp};

/// How the end of each busy phase is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Each worker samples the clock until its own busy phase is over.
    #[default]
    Independent,
    /// Workers spin on the shared phase gate and the coordinator releases
    /// them all at once.
    Barrier,
}

/// Run-wide state shared by the coordinator and every worker.
///
/// Only the stop flag changes once workers are started.
#[derive(Debug)]
pub struct RunControl {
    end_time: Option<Timestamp>,
    stop: AtomicBool,
    mode: SyncMode,
}

impl RunControl {
    pub fn new(end_time: Option<Timestamp>, mode: SyncMode) -> Self {
        Self {
            end_time,
            stop: AtomicBool::new(false),
            mode,
        }
    }

    /// `duration_secs == 0` runs until stopped. A duration whose end time
    /// cannot be represented is rejected.
    pub fn starting_at(
        now: Timestamp,
        duration_secs: u64,
        mode: SyncMode,
    ) -> Result<Self, ConfigError> {
        if duration_secs == 0 {
            return Ok(Self::new(None, mode));
        }
        let end_time = now
            .checked_add_secs(duration_secs)
            .ok_or(ConfigError::DurationTooLarge(duration_secs))?;
        Ok(Self::new(Some(end_time), mode))
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn end_time(&self) -> Option<Timestamp> {
        self.end_time
    }

    /// Safe to call from a signal handler context any number of times.
    /// Returns `true` only for the call that actually stopped the run.
    pub fn request_stop(&self) -> bool {
        !self.stop.swap(true, Ordering::Relaxed)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn keep_running(&self, now: Timestamp) -> bool {
        if self.stop_requested() {
            return false;
        }
        match self.end_time {
            Some(end) => elapsed_micros(now, end) < 0,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_runs_until_stopped() {
        let ctl = RunControl::starting_at(Timestamp::new(100, 0), 0, SyncMode::Independent).unwrap();
        assert_eq!(ctl.end_time(), None);
        assert!(ctl.keep_running(Timestamp::new(1_000_000, 0)));
        assert!(ctl.request_stop());
        assert!(!ctl.keep_running(Timestamp::new(100, 0)));
    }

    #[test]
    fn bounded_stops_at_end_time() {
        let ctl = RunControl::starting_at(Timestamp::new(100, 250), 2, SyncMode::Barrier).unwrap();
        assert_eq!(ctl.mode(), SyncMode::Barrier);
        assert!(ctl.keep_running(Timestamp::new(102, 249)));
        assert!(!ctl.keep_running(Timestamp::new(102, 250)));
        assert!(!ctl.keep_running(Timestamp::new(103, 0)));
    }

    #[test]
    fn huge_duration_is_rejected_not_wrapped() {
        let now = Timestamp::new(1_700_000_000, 0);
        for secs in [u64::MAX, i64::MAX as u64] {
            assert_eq!(
                RunControl::starting_at(now, secs, SyncMode::Independent).unwrap_err(),
                ConfigError::DurationTooLarge(secs)
            );
        }

        // The largest duration that still fits keeps running.
        let ctl = RunControl::starting_at(
            now,
            (i64::MAX - now.secs) as u64,
            SyncMode::Independent,
        )
        .unwrap();
        assert!(ctl.keep_running(now));
    }

    #[test]
    fn only_first_stop_request_counts() {
        let ctl = RunControl::new(None, SyncMode::Independent);
        assert!(!ctl.stop_requested());
        assert!(ctl.request_stop());
        assert!(!ctl.request_stop());
        assert!(ctl.stop_requested());
    }
}
