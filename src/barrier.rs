//! Shared phase gate for barrier mode.
//!
//! Workers spin on the gate in place of reading the clock. The coordinator
//! is the only writer: it releases the gate at the end of the busy phase,
//! waits until every worker has gone back to its idle sleep, then re-arms
//! it for the next second.
//!
//! Each release bumps a generation. A worker acknowledges the generation it
//! was released by, so an idle flag left over from the previous cycle never
//! counts as having seen the current release.

use std::hint;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use log::debug;

use crate::slot::ProcessorSlot;

const ARMED: u8 = 0;
const RELEASED: u8 = 1;
const OPEN: u8 = 2;

#[derive(Debug)]
pub struct PhaseGate {
    state: AtomicU8,
    generation: AtomicU64,
}

impl Default for PhaseGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseGate {
    /// Starts armed, so even the first busy phase waits for a release.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ARMED),
            generation: AtomicU64::new(0),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.state.load(Ordering::Acquire) == ARMED
    }

    /// Worker side: burn the CPU until the coordinator lets go.
    ///
    /// This loop is the load. It must not be turned into a blocking wait.
    /// Returns the generation of the release that let it through.
    pub fn spin(&self) -> u64 {
        while self.is_armed() {
            hint::spin_loop();
        }
        self.generation()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Coordinator side: end the current busy phase for everyone. Returns
    /// the generation workers must acknowledge.
    pub fn release(&self) -> u64 {
        if self.is_armed() {
            self.generation.fetch_add(1, Ordering::AcqRel);
            let _ = self
                .state
                .compare_exchange(ARMED, RELEASED, Ordering::AcqRel, Ordering::Acquire);
        }
        self.generation()
    }

    /// Coordinator side: arm for the next cycle. A permanently opened gate
    /// stays open.
    pub fn rearm(&self) {
        let _ = self
            .state
            .compare_exchange(RELEASED, ARMED, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Let every current and future spin through. Used at shutdown so no
    /// worker can be left spinning on a gate nobody will release.
    pub fn open(&self) {
        self.state.store(OPEN, Ordering::Release);
    }

    /// One full release cycle over the selected slots. The gate is only
    /// re-armed once every selected worker has gone idle after this
    /// release, busy-polling their flags until then.
    pub fn release_and_collect(&self, slots: &[ProcessorSlot]) {
        let generation = self.release();
        let mut polls: u64 = 0;
        while !all_idle_since(slots, generation) {
            polls += 1;
            hint::spin_loop();
        }
        debug!(
            "phase gate release {} acknowledged after {} polls",
            generation, polls
        );
        self.rearm();
    }
}

fn all_idle_since(slots: &[ProcessorSlot], generation: u64) -> bool {
    slots
        .iter()
        .filter(|s| s.is_selected())
        .all(|s| s.idle_since(generation))
}
