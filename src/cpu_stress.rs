//! The per-processor load loop.
//!
//! Each cycle sleeps to the top of the next second and then stays busy for
//! the slot's budget. The busy phase is a deliberate spin: it is the load
//! this tool exists to generate, so it must never block or yield.

use crate::barrier::PhaseGate;
use crate::control::{RunControl, SyncMode};
use crate::phase::{
    busy_phase_end, busy_phase_over, cycle_second, idle_sleep_micros, missed_deadline,
};
use crate::slot::ProcessorSlot;
use crate::timing::{Clock, Timestamp};

pub struct Worker<'a, C: Clock> {
    slot: &'a ProcessorSlot,
    control: &'a RunControl,
    gate: &'a PhaseGate,
    clock: &'a C,
}

impl<'a, C: Clock> Worker<'a, C> {
    pub fn new(
        slot: &'a ProcessorSlot,
        control: &'a RunControl,
        gate: &'a PhaseGate,
        clock: &'a C,
    ) -> Self {
        Self {
            slot,
            control,
            gate,
            clock,
        }
    }

    /// Run cycles until the run is stopped or its end time has passed. The
    /// stop condition is only checked between cycles.
    pub fn run(&self) {
        let budget = self.slot.utilization().busy_budget_micros();
        let mut now = self.clock.now();
        self.slot.set_waiting(true);
        while self.control.keep_running(now) {
            now = self.cycle(now, budget);
        }
        self.slot.retire();
    }

    /// One idle + busy cycle. `now` is the time the previous busy phase
    /// ended; returns the time this one ended.
    pub fn cycle(&self, now: Timestamp, budget_micros: i64) -> Timestamp {
        self.clock.sleep_micros(idle_sleep_micros(now));
        self.slot.set_waiting(false);

        let second = cycle_second(now);
        let finished = match self.control.mode() {
            SyncMode::Independent => self.spin_until(busy_phase_end(now, budget_micros)),
            SyncMode::Barrier => {
                let generation = self.gate.spin();
                self.slot.acknowledge(generation);
                self.clock.now()
            }
        };

        if missed_deadline(second, finished) {
            self.slot.record_miss();
        }
        self.slot.set_waiting(true);
        finished
    }

    fn spin_until(&self, end: Timestamp) -> Timestamp {
        let mut now = self.clock.now();
        while !busy_phase_over(end, now) {
            now = self.clock.now();
        }
        now
    }
}
