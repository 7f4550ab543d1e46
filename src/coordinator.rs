//! Starts one pinned worker per selected CPU, reports misses once a second
//! and, in barrier mode, drives the phase gate.

use std::io::{self, Write};
use std::thread;

use crossbeam::channel;
use log::{debug, info, warn};

use crate::affinity::ThreadPlacement;
use crate::barrier::PhaseGate;
use crate::control::{RunControl, SyncMode};
use crate::cpu_stress::Worker;
use crate::error::{RunError, SetupError};
use crate::phase::{busy_phase_end, idle_sleep_micros, Utilization};
use crate::report::{self, RunSummary};
use crate::slot::ProcessorSlot;
use crate::timing::{elapsed_micros, Clock};

pub struct Coordinator<'a, C: Clock, P: ThreadPlacement> {
    slots: Vec<ProcessorSlot>,
    default_utilization: Utilization,
    priority: u32,
    control: &'a RunControl,
    clock: C,
    placement: P,
}

impl<'a, C: Clock, P: ThreadPlacement> Coordinator<'a, C, P> {
    pub fn new(
        slots: Vec<ProcessorSlot>,
        default_utilization: Utilization,
        priority: u32,
        control: &'a RunControl,
        clock: C,
        placement: P,
    ) -> Self {
        Self {
            slots,
            default_utilization,
            priority,
            control,
            clock,
            placement,
        }
    }

    /// Run to completion and print the summary.
    ///
    /// Any setup failure stops and joins the workers that did start before
    /// the error is returned; nothing keeps running behind it.
    pub fn run<W: Write>(&self, out: &mut W) -> Result<RunSummary, RunError> {
        self.placement
            .set_current_priority(self.priority)
            .map_err(|source| SetupError::CoordinatorPriority {
                prio: self.priority,
                source,
            })?;

        let gate = PhaseGate::new();
        let selected: Vec<&ProcessorSlot> = self.slots.iter().filter(|s| s.is_selected()).collect();
        info!(
            "Using {} CPUs, {:?} mode, {}",
            selected.len(),
            self.control.mode(),
            match self.control.end_time() {
                Some(end) => format!("until {}", end.secs),
                None => "until interrupted".to_string(),
            }
        );

        thread::scope(|s| -> Result<(), RunError> {
            let (tx, rx) = channel::unbounded::<Result<u32, SetupError>>();
            let mut started = 0;

            for &slot in &selected {
                let tx = tx.clone();
                let (control, gate, clock, placement) =
                    (self.control, &gate, &self.clock, &self.placement);
                let spawned = thread::Builder::new()
                    .name(format!("use-cpu/{}", slot.id()))
                    .spawn_scoped(s, move || {
                        if let Err(err) = placement.place_worker(slot.id(), slot.priority()) {
                            let _ = tx.send(Err(err));
                            return;
                        }
                        let _ = tx.send(Ok(slot.id()));
                        drop(tx);
                        Worker::new(slot, control, gate, clock).run();
                    });
                if let Err(source) = spawned {
                    self.abort(&gate);
                    return Err(SetupError::Spawn {
                        cpu: slot.id(),
                        source,
                    }
                    .into());
                }
                started += 1;
            }
            drop(tx);

            for _ in 0..started {
                match rx.recv() {
                    Ok(Ok(cpu)) => debug!("worker on CPU {} running", cpu),
                    Ok(Err(err)) => {
                        self.abort(&gate);
                        return Err(err.into());
                    }
                    Err(_) => {
                        self.abort(&gate);
                        return Err(SetupError::WorkerLost.into());
                    }
                }
            }

            let result = self.report_loop(&gate, out);
            self.control.request_stop();
            gate.open();
            result.map_err(RunError::from)
        })?;

        let summary = RunSummary::collect(&self.slots);
        report::write_summary(&summary, out)?;
        Ok(summary)
    }

    fn abort(&self, gate: &PhaseGate) {
        warn!("setup failed, stopping workers");
        self.control.request_stop();
        gate.open();
    }

    fn report_loop<W: Write>(&self, gate: &PhaseGate, out: &mut W) -> io::Result<()> {
        let budget = self.default_utilization.busy_budget_micros();
        let mut now = self.clock.now();
        while self.control.keep_running(now) {
            self.clock.sleep_micros(idle_sleep_micros(now));

            if self.control.mode() == SyncMode::Barrier {
                let end = busy_phase_end(now, budget);
                let woke = self.clock.now();
                self.clock.sleep_micros(elapsed_micros(end, woke));
                gate.release_and_collect(&self.slots);
            }

            report::write_new_misses(&self.slots, out)?;
            now = self.clock.now();
        }
        Ok(())
    }
}
