//! Synthetic per-CPU load generator for checking real-time scheduling.
//!
//! Every selected CPU gets a pinned thread that, once a second, spins for a
//! fixed share of the second and sleeps for the rest. A busy phase that runs
//! into the next second is counted as a missed deadline.

pub mod affinity;
pub mod barrier;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod cpu_stress;
pub mod error;
pub mod phase;
pub mod report;
pub mod slot;
pub mod timing;
pub mod topology;

pub use affinity::{OsPlacement, ThreadPlacement, Unpinned};
pub use config::{build_slots, Opts, RunSettings};
pub use control::{RunControl, SyncMode};
pub use coordinator::Coordinator;
pub use error::{ConfigError, RunError, SetupError, TopologyError};
pub use phase::Utilization;
pub use report::RunSummary;
pub use timing::{Clock, SystemClock, Timestamp};
pub use topology::Topology;
