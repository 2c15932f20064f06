//! CDPR Common Library
//!
//! Shared constants, configuration loading and drive protocol types for all
//! crates of the cable robot control workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Workspace-wide limits and defaults
//! - [`config`] - Configuration loading traits and types
//! - [`drive`] - Drive states, control/status words, PDO table
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use cdpr_common::prelude::*;
//!
//! let word = StatusWord::from_raw(0x0027);
//! assert_eq!(word.decode_state(), DriveState::OperationEnabled);
//! ```

pub mod config;
pub mod consts;
pub mod drive;
pub mod prelude;
