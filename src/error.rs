use std::path::PathBuf;

use thiserror::Error;

/// Rejected command-line values. Raised before any worker thread exists.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid percent: {0}")]
    InvalidPercent(String),

    #[error("Percent must be < 100")]
    PercentTooLarge,

    #[error("cpu specifier {0} is invalid")]
    InvalidCpuSpecifier(usize),

    #[error("cpu specifier {0} is larger than the number of processors")]
    CpuOutOfRange(usize),

    #[error("cpu specifier {0} is not a valid processor")]
    CpuNotPresent(usize),

    #[error("cpu percent must be < 100")]
    CpuPercentTooLarge,

    #[error("no usable processors selected")]
    NoProcessors,

    #[error("duration of {0} seconds is too large")]
    DurationTooLarge(u64),
}

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Unable to open {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line} - Invalid processor line format")]
    InvalidLine { path: PathBuf, line: usize },
}

/// Failures while placing a worker on its processor. Always fatal for the run.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("sched_setaffinity to CPU {cpu}: {source}")]
    Affinity {
        cpu: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("sched_setscheduler priority {prio} for CPU {cpu}: {source}")]
    Priority {
        cpu: u32,
        prio: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("sched_setscheduler priority {prio} for coordinator thread: {source}")]
    CoordinatorPriority {
        prio: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to spawn worker thread for CPU {cpu}: {source}")]
    Spawn {
        cpu: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("a worker thread exited before reporting its setup")]
    WorkerLost,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("writing report: {0}")]
    Output(#[from] std::io::Error),
}
