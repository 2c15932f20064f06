//! Integration test: configuration files.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use cdpr_common::config::{ConfigError, LogLevel};
use cdpr_control_unit::config::{load_config, load_config_from_str};
use cdpr_rt::sched::SchedPolicy;

const FULL_TOML: &str = r#"
[shared]
log_level = "debug"
service_name = "cdpr-test"

[executor]
cycle_time_ns = 500000
cpus = [0, -1]
policy = "rr"
priority = 60
reserve_memory_bytes = 1048576

[[drives]]
id = 1
name = "winch-1"
slave_position = 0

[[drives]]
id = 2
name = "winch-2"

[simulation]
fault_drive = 2
fault_after_cycles = 100
"#;

#[test]
fn shipped_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/cdpr.toml");
    let config = load_config(&path).unwrap();
    assert_eq!(config.drives.len(), 4);
    assert_eq!(config.executor.policy, SchedPolicy::Other);
    assert_eq!(config.executor.cpus, vec![-1]);
    assert_eq!(config.cpu_affinity().unwrap().len(), 1);
}

#[test]
fn full_config_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(FULL_TOML.as_bytes()).unwrap();

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.shared.log_level, LogLevel::Debug);
    assert_eq!(config.shared.service_name, "cdpr-test");
    assert_eq!(config.executor.cycle_time_ns, 500_000);
    assert_eq!(config.executor.reserve_memory_bytes, 1 << 20);
    assert_eq!(config.drives[0].slave_position, Some(0));
    assert_eq!(config.drives[1].slave_position, None);
    assert_eq!(config.drive_layout(), vec![(1, 0), (2, 1)]);
    assert_eq!(config.simulation.fault_drive, Some(2));

    let sched = config.sched_attr().unwrap();
    assert_eq!(sched.policy(), SchedPolicy::RoundRobin);
    assert_eq!(sched.priority(), 60);
}

#[test]
fn missing_file_is_reported() {
    assert!(matches!(
        load_config(Path::new("/nonexistent/cdpr.toml")),
        Err(ConfigError::FileNotFound(_))
    ));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    assert!(matches!(
        load_config_from_str("[[drives]\nid = "),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn other_policy_coerces_priority() {
    let text = r#"
[executor]
policy = "other"
priority = 50

[[drives]]
id = 1
name = "a"
"#;
    let config = load_config_from_str(text).unwrap();
    assert_eq!(config.sched_attr().unwrap().priority(), 0);
}

#[test]
fn blank_drive_name_rejected() {
    let text = r#"
[[drives]]
id = 1
name = "  "
"#;
    assert!(matches!(
        load_config_from_str(text),
        Err(ConfigError::ValidationError(_))
    ));
}
