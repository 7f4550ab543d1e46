//! Console output: per-cycle miss deltas and the end-of-run summary.

use std::io::{self, Write};

use crate::slot::ProcessorSlot;

pub const FINISHED: &str = "Finished using CPU";

/// Totals at the end of a run, one entry per CPU that missed at least once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub missed: Vec<(u32, u32)>,
}

impl RunSummary {
    pub fn collect(slots: &[ProcessorSlot]) -> Self {
        Self {
            missed: slots
                .iter()
                .filter(|s| s.missed() > 0)
                .map(|s| (s.id(), s.missed()))
                .collect(),
        }
    }

    pub fn total_missed(&self) -> u64 {
        self.missed.iter().map(|&(_, n)| u64::from(n)).sum()
    }
}

/// Print a line for every slot whose miss count grew since the last call.
/// Returns how many lines were written.
pub fn write_new_misses<W: Write>(slots: &[ProcessorSlot], out: &mut W) -> io::Result<usize> {
    let mut lines = 0;
    for slot in slots {
        if let Some(delta) = slot.take_new_misses() {
            writeln!(out, "Missed scheduling {} times on CPU {}", delta, slot.id())?;
            lines += 1;
        }
    }
    if lines > 0 {
        out.flush()?;
    }
    Ok(lines)
}

pub fn write_summary<W: Write>(summary: &RunSummary, out: &mut W) -> io::Result<()> {
    for &(cpu, missed) in &summary.missed {
        writeln!(out, " CPU {}: Missed scheduling {} times.", cpu, missed)?;
    }
    writeln!(out, "{}", FINISHED)?;
    out.flush()
}
