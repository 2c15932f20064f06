//! CDPR real-time primitives.
//!
//! - [`clock`] - Absolute-time cycle clock and time helpers
//! - [`cpu`] - CPU affinity sets
//! - [`sched`] - Scheduling policy and priority
//! - [`memory`] - One-time process memory locking and prefaulting
//! - [`executor`] - Named cyclic real-time thread
//!
//! # Usage
//!
//! ```rust,no_run
//! use cdpr_rt::prelude::*;
//!
//! init_process_memory(8 * 1024 * 1024)?;
//!
//! let mut exec = CyclicExecutor::new("winch");
//! exec.configure(CpuAffinity::last(), SchedAttr::fifo(80)?)?;
//! exec.set_loop(|| { /* one control cycle */ })?;
//! exec.start(1_000_000)?;
//! // ...
//! exec.stop();
//! # Ok::<(), cdpr_rt::RtError>(())
//! ```

pub mod clock;
pub mod cpu;
pub mod error;
pub mod executor;
pub mod memory;
pub mod sched;

pub use error::RtError;

pub mod prelude {
    pub use crate::clock::CycleClock;
    pub use crate::cpu::{CpuAffinity, LAST_CORE, cpu_cores_count};
    pub use crate::error::RtError;
    pub use crate::executor::{CyclicExecutor, DeadlineMode};
    pub use crate::memory::init_process_memory;
    pub use crate::sched::{SchedAttr, SchedPolicy};
}
