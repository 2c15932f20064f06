//! System-wide constants for the CDPR workspace.
//!
//! Single source of truth for numeric limits and defaults.

/// Maximum number of drives handled by one control unit.
pub const MAX_DRIVES: usize = 16;

/// Default control cycle period [ns] (1 kHz).
pub const DEFAULT_CYCLE_TIME_NS: u64 = 1_000_000;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Default amount of heap reserved and prefaulted before the RT loop [bytes].
pub const DEFAULT_RESERVE_MEMORY_BYTES: usize = 8 * 1024 * 1024;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/cdpr.toml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(MAX_DRIVES > 0 && MAX_DRIVES <= 256);
        assert!(DEFAULT_CYCLE_TIME_NS > 0);
        assert!((DEFAULT_CYCLE_TIME_NS as i64) < NANOS_PER_SEC);
        assert!(DEFAULT_RESERVE_MEMORY_BYTES >= 4096);
    }
}
