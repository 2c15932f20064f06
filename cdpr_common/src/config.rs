//! TOML configuration layer shared by the CDPR binaries.
//!
//! Each binary describes its file as a `serde` struct embedding a
//! [`SharedConfig`] under `[shared]`; [`ConfigLoader`] is implemented for any
//! such struct.
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use cdpr_common::config::{ConfigError, ConfigLoader, SharedConfig};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct WinchConfig {
//!     shared: SharedConfig,
//!     cycle_time_ns: u64,
//! }
//!
//! fn winch_period(path: &Path) -> Result<u64, ConfigError> {
//!     let config = WinchConfig::load(path)?;
//!     config.shared.validate()?;
//!     Ok(config.cycle_time_ns)
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to obtain a usable configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("config file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// Unreadable file or malformed TOML.
    #[error("cannot parse config: {0}")]
    ParseError(String),

    /// Well-formed but inconsistent values.
    #[error("invalid config: {0}")]
    ValidationError(String),
}

/// `shared.log_level`; `RUST_LOG` still overrides it at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// `EnvFilter` directive for this level.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// `[shared]` section.
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "cdpr-cu"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedConfig {
    #[serde(default)]
    pub log_level: LogLevel,
    /// Names the process in logs and the RT thread.
    pub service_name: String,
}

impl SharedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "shared.service_name is blank".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            service_name: "cdpr".into(),
        }
    }
}

/// TOML loading for any deserializable config struct.
///
/// A missing file is [`ConfigError::FileNotFound`]; any other I/O failure
/// and any syntax or type error is [`ConfigError::ParseError`].
pub trait ConfigLoader: Sized + DeserializeOwned {
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            Err(e) => {
                return Err(ConfigError::ParseError(format!("{}: {e}", path.display())));
            }
        };
        Self::load_str(&text)
    }

    fn load_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Like [`load`](Self::load), but a missing file yields `Default`.
    fn load_or_default(path: &Path) -> Result<Self, ConfigError>
    where
        Self: Default,
    {
        match Self::load(path) {
            Err(ConfigError::FileNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }
}

impl<T: DeserializeOwned> ConfigLoader for T {}

// ─── Tests ──────────────────────────────────────────────────────────
