//! Control unit TOML configuration.
//!
//! ```toml
//! [shared]
//! service_name = "cdpr-cu"
//!
//! [executor]
//! cycle_time_ns = 1000000
//! cpus = [-1]
//! policy = "fifo"
//! priority = 80
//!
//! [[drives]]
//! id = 1
//! name = "winch-1"
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use cdpr_common::config::{ConfigError, ConfigLoader, SharedConfig};
use cdpr_common::consts::{DEFAULT_CYCLE_TIME_NS, DEFAULT_RESERVE_MEMORY_BYTES, MAX_DRIVES};
use cdpr_rt::cpu::CpuAffinity;
use cdpr_rt::sched::{SchedAttr, SchedPolicy};

// ─── Sections ───────────────────────────────────────────────────────

/// `[executor]`: RT thread placement and pacing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Cycle period [ns].
    pub cycle_time_ns: u64,
    /// CPU indices; empty = all cores, `-1` = last core.
    pub cpus: Vec<isize>,
    pub policy: SchedPolicy,
    /// Defaults per policy when absent.
    pub priority: Option<i32>,
    /// Heap reserved and prefaulted at startup [bytes].
    pub reserve_memory_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            cycle_time_ns: DEFAULT_CYCLE_TIME_NS,
            cpus: Vec::new(),
            policy: SchedPolicy::Fifo,
            priority: None,
            reserve_memory_bytes: DEFAULT_RESERVE_MEMORY_BYTES,
        }
    }
}

/// One `[[drives]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveConfig {
    pub id: u16,
    pub name: String,
    /// Position on the bus, when it differs from the list order.
    #[serde(default)]
    pub slave_position: Option<usize>,
}

/// `[simulation]`: fault injection for the simulated bus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Id of the drive to fault.
    pub fault_drive: Option<u16>,
    /// Cycles before the fault is raised.
    pub fault_after_cycles: Option<u64>,
}

/// Complete control unit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlUnitConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub drives: Vec<DriveConfig>,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl ControlUnitConfig {
    /// Semantic checks not covered by deserialization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.executor.cycle_time_ns == 0 {
            return Err(invalid("executor.cycle_time_ns must be > 0"));
        }
        if self.drives.is_empty() {
            return Err(invalid("at least one [[drives]] entry is required"));
        }
        if self.drives.len() > MAX_DRIVES {
            return Err(invalid(format!(
                "{} drives configured, max {MAX_DRIVES}",
                self.drives.len()
            )));
        }

        let mut ids = HashSet::new();
        for drive in &self.drives {
            if drive.name.trim().is_empty() {
                return Err(invalid(format!("drive {} has an empty name", drive.id)));
            }
            if !ids.insert(drive.id) {
                return Err(invalid(format!("duplicate drive id {}", drive.id)));
            }
        }

        let mut positions = HashSet::new();
        for (id, position) in self.drive_layout() {
            if position >= self.drives.len() {
                return Err(invalid(format!(
                    "drive {id}: slave_position {position} outside a bus of {} drives",
                    self.drives.len()
                )));
            }
            if !positions.insert(position) {
                return Err(invalid(format!(
                    "drive {id}: slave_position {position} already taken"
                )));
            }
        }

        if let Some(id) = self.simulation.fault_drive {
            if !ids.contains(&id) {
                return Err(invalid(format!("simulation.fault_drive {id} is not configured")));
            }
        }

        self.sched_attr()?;
        Ok(())
    }

    /// Affinity from `executor.cpus`.
    pub fn cpu_affinity(&self) -> Result<CpuAffinity, ConfigError> {
        CpuAffinity::from_cores(&self.executor.cpus).map_err(|e| invalid(e.to_string()))
    }

    /// Scheduling attributes from `executor.policy` / `executor.priority`.
    pub fn sched_attr(&self) -> Result<SchedAttr, ConfigError> {
        SchedAttr::new(self.executor.policy, self.executor.priority)
            .map_err(|e| invalid(e.to_string()))
    }

    pub fn drive_ids(&self) -> Vec<u16> {
        self.drives.iter().map(|d| d.id).collect()
    }

    /// List index of the drive with `id`.
    pub fn drive_index(&self, id: u16) -> Option<usize> {
        self.drives.iter().position(|d| d.id == id)
    }

    /// `(id, bus position)` per drive, in list order. Position defaults to
    /// the list index.
    pub fn drive_layout(&self) -> Vec<(u16, usize)> {
        self.drives
            .iter()
            .enumerate()
            .map(|(index, d)| (d.id, d.slave_position.unwrap_or(index)))
            .collect()
    }

    /// Bus position of the drive with `id`.
    pub fn bus_position(&self, id: u16) -> Option<usize> {
        self.drive_layout()
            .into_iter()
            .find_map(|(drive, position)| (drive == id).then_some(position))
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

// ─── Loading ────────────────────────────────────────────────────────

/// Load and validate the configuration file.
pub fn load_config(path: &Path) -> Result<ControlUnitConfig, ConfigError> {
    let config = ControlUnitConfig::load(path)?;
    config.validate()?;
    Ok(config)
}

/// Parse and validate configuration text (for testing).
pub fn load_config_from_str(content: &str) -> Result<ControlUnitConfig, ConfigError> {
    let config = ControlUnitConfig::load_str(content)?;
    config.validate()?;
    Ok(config)
}

// ─── Tests ──────────────────────────────────────────────────────────
