use std::io;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const MICROS_PER_SEC: i64 = 1_000_000;

/// Wall-clock instant with microsecond resolution.
///
/// `micros` is always normalized into `0..MICROS_PER_SEC`, so it doubles as
/// the position within the current second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub secs: i64,
    pub micros: i64,
}

impl Timestamp {
    pub fn new(secs: i64, micros: i64) -> Self {
        Self {
            secs: secs + micros.div_euclid(MICROS_PER_SEC),
            micros: micros.rem_euclid(MICROS_PER_SEC),
        }
    }

    pub fn from_micros(total: i64) -> Self {
        Self::new(0, total)
    }

    pub fn add_micros(self, micros: i64) -> Self {
        Self::new(self.secs, self.micros + micros)
    }

    /// `None` when the result does not fit.
    pub fn checked_add_secs(self, secs: u64) -> Option<Self> {
        let secs = i64::try_from(secs).ok()?;
        Some(Self {
            secs: self.secs.checked_add(secs)?,
            micros: self.micros,
        })
    }
}

/// Signed microseconds from `earlier` to `later`; negative when `earlier`
/// is actually the later of the two. Saturates at the `i64` bounds.
pub fn elapsed_micros(later: Timestamp, earlier: Timestamp) -> i64 {
    later
        .secs
        .saturating_sub(earlier.secs)
        .saturating_mul(MICROS_PER_SEC)
        .saturating_add(later.micros - earlier.micros)
}

/// Time source used by the worker and coordinator loops.
pub trait Clock: Sync {
    fn now(&self) -> Timestamp;

    /// Suspend the calling thread. Non-positive durations return at once.
    fn sleep_micros(&self, micros: i64);
}

/// `CLOCK_REALTIME`, the clock whose second boundaries the cycles align to.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    /// Read `CLOCK_REALTIME` once, reporting the failure if it cannot be read.
    pub fn check(&self) -> io::Result<Timestamp> {
        realtime()
    }
}

fn realtime() -> io::Result<Timestamp> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let rv = unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
    if rv != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(Timestamp::new(ts.tv_sec as i64, ts.tv_nsec as i64 / 1000))
}

impl Clock for SystemClock {
    /// Falls back to `SystemTime` if `clock_gettime` fails. Both read the
    /// same realtime clock on Linux.
    fn now(&self) -> Timestamp {
        realtime().unwrap_or_else(|_| {
            let since_epoch = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            Timestamp::new(
                since_epoch.as_secs() as i64,
                since_epoch.subsec_micros() as i64,
            )
        })
    }

    fn sleep_micros(&self, micros: i64) {
        if micros > 0 {
            thread::sleep(Duration::from_micros(micros as u64));
        }
    }
}
