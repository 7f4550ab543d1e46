//! Pinning and scheduling policy for the calling thread.

use std::io;

use crate::error::SetupError;

/// Places the calling thread on a processor and scheduling class.
pub trait ThreadPlacement: Sync {
    fn pin_current(&self, cpu: u32) -> io::Result<()>;

    /// `prio == 0` is the normal time-sharing class, anything above is
    /// `SCHED_FIFO` at that priority.
    fn set_current_priority(&self, prio: u32) -> io::Result<()>;

    /// Full setup for a worker thread: policy first, then the CPU.
    fn place_worker(&self, cpu: u32, prio: u32) -> Result<(), SetupError> {
        self.set_current_priority(prio)
            .map_err(|source| SetupError::Priority { cpu, prio, source })?;
        self.pin_current(cpu)
            .map_err(|source| SetupError::Affinity { cpu, source })
    }
}

/// The real thing, via `sched_setaffinity(2)` and `sched_setscheduler(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsPlacement;

impl ThreadPlacement for OsPlacement {
    fn pin_current(&self, cpu: u32) -> io::Result<()> {
        if cpu as usize >= libc::CPU_SETSIZE as usize {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        let rv = unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_SET(cpu as usize, &mut set);
            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
        };
        if rv != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn set_current_priority(&self, prio: u32) -> io::Result<()> {
        let policy = if prio > 0 {
            libc::SCHED_FIFO
        } else {
            libc::SCHED_OTHER
        };
        let param = libc::sched_param {
            sched_priority: prio as libc::c_int,
        };
        let rv = unsafe { libc::sched_setscheduler(0, policy, &param) };
        if rv != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

/// Leaves threads wherever the scheduler puts them. For running the loops
/// without privileges, e.g. in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unpinned;

impl ThreadPlacement for Unpinned {
    fn pin_current(&self, _cpu: u32) -> io::Result<()> {
        Ok(())
    }

    fn set_current_priority(&self, _prio: u32) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RejectPin;

    impl ThreadPlacement for RejectPin {
        fn pin_current(&self, _cpu: u32) -> io::Result<()> {
            Err(io::Error::from_raw_os_error(libc::EINVAL))
        }

        fn set_current_priority(&self, _prio: u32) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn place_worker_reports_the_cpu() {
        let err = RejectPin.place_worker(7, 0).unwrap_err();
        assert!(matches!(err, SetupError::Affinity { cpu: 7, .. }));
        assert!(err.to_string().contains("CPU 7"));
    }

    #[test]
    fn unpinned_always_succeeds() {
        assert!(Unpinned.place_worker(0, 99).is_ok());
    }

    #[test]
    fn os_rejects_cpu_beyond_set_size() {
        let err = OsPlacement
            .pin_current(libc::CPU_SETSIZE as u32 + 1)
            .unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
    }
}
