//! Error type of the real-time primitives.

use nix::errno::Errno;
use thiserror::Error;

use crate::sched::SchedPolicy;

/// Errors reported by clocks, executors and process setup.
///
/// Configuration variants are returned to the caller synchronously.
/// `Os` failures raised inside a running executor thread never reach a
/// caller: the thread logs them and aborts the process.
#[derive(Debug, Error)]
pub enum RtError {
    #[error("invalid CPU index {cpu} ({available} cores available)")]
    InvalidCpu { cpu: isize, available: usize },

    #[error("{requested} CPUs requested but only {available} available")]
    TooManyCpus { requested: usize, available: usize },

    #[error("priority {priority} is not valid for policy {policy}")]
    InvalidPriority { policy: SchedPolicy, priority: i32 },

    #[error("[{name}] no loop callback set")]
    MissingLoop { name: String },

    #[error("[{name}] executor already active")]
    AlreadyActive { name: String },

    #[error("[{name}] cycle period must be greater than zero")]
    InvalidPeriod { name: String },

    #[error("[{name}] {operation} failed: {source}")]
    Os {
        name: String,
        operation: &'static str,
        #[source]
        source: Errno,
    },

    #[error("[{name}] failed to spawn thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl RtError {
    pub(crate) fn os(name: &str, operation: &'static str, source: Errno) -> Self {
        Self::Os {
            name: name.to_string(),
            operation,
            source,
        }
    }
}
