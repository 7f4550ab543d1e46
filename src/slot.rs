//! One entry per processor id on the host.
//!
//! Workers write only their own slot's `missed`, `waiting` and `acked`.
//! The coordinator is the only writer of `last_reported`. Nothing needs a
//! lock: a report that lags a cycle behind is fine.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::phase::Utilization;

/// Acknowledgement left by a worker that has stopped cycling; it satisfies
/// every later gate release.
pub const RETIRED: u64 = u64::MAX;

#[derive(Debug)]
pub struct ProcessorSlot {
    id: u32,
    valid: bool,
    selected: bool,
    utilization: Utilization,
    priority: u32,
    missed: AtomicU32,
    last_reported: AtomicU32,
    waiting: AtomicBool,
    acked: AtomicU64,
}

impl ProcessorSlot {
    pub fn new(id: u32, valid: bool) -> Self {
        Self {
            id,
            valid,
            selected: false,
            utilization: Utilization::default(),
            priority: 0,
            missed: AtomicU32::new(0),
            last_reported: AtomicU32::new(0),
            waiting: AtomicBool::new(false),
            acked: AtomicU64::new(0),
        }
    }

    /// Mark the slot for use. Configuration time only.
    pub fn select(&mut self, utilization: Utilization, priority: u32) {
        self.selected = true;
        self.utilization = utilization;
        self.priority = priority;
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn utilization(&self) -> Utilization {
        self.utilization
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn missed(&self) -> u32 {
        self.missed.load(Ordering::Relaxed)
    }

    /// Worker side.
    pub fn record_miss(&self) {
        self.missed.fetch_add(1, Ordering::Relaxed);
    }

    /// Worker side.
    pub fn set_waiting(&self, waiting: bool) {
        self.waiting.store(waiting, Ordering::Release);
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::Acquire)
    }

    /// Worker side: record the gate release that ended this busy phase.
    /// Must precede `set_waiting(true)`.
    pub fn acknowledge(&self, generation: u64) {
        self.acked.store(generation, Ordering::Release);
    }

    /// Worker side, once the loop has exited.
    pub fn retire(&self) {
        self.acknowledge(RETIRED);
        self.set_waiting(true);
    }

    /// Idle, and idle since the gate release numbered `generation`.
    pub fn idle_since(&self, generation: u64) -> bool {
        self.is_waiting() && self.acked.load(Ordering::Acquire) >= generation
    }

    /// Coordinator side. Returns how many misses were recorded since the
    /// previous call, or `None` when there are none.
    pub fn take_new_misses(&self) -> Option<u32> {
        let missed = self.missed();
        let last = self.last_reported.load(Ordering::Relaxed);
        if missed > last {
            self.last_reported.store(missed, Ordering::Relaxed);
            Some(missed - last)
        } else {
            None
        }
    }
}
