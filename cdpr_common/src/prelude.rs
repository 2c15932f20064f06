//! Prelude module for common re-exports.
//!
//! ```rust
//! use cdpr_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{DEFAULT_CYCLE_TIME_NS, MAX_DRIVES, NANOS_PER_SEC};

// ─── Drive Protocol ─────────────────────────────────────────────────
pub use crate::drive::{ControlWord, DriveCommand, DriveState, OperationMode, StatusWord};
