//! Integration tests for configuration loading.
//!
//! Covers the typed [`ConfigLoader`] path for application sections and the
//! [`TomlSource`] lookup used for machine parameters, both from files on disk.

use serde::Deserialize;
use std::io::Write;
use taskmot_common::config::{
    ConfigError, ConfigLoader, ConfigSource, LogLevel, SharedConfig, TomlSource,
};
use tempfile::{NamedTempFile, TempDir};

#[derive(Debug, Deserialize)]
struct TestApp {
    shared: SharedConfig,
}

/// Write `content` to a temporary `.toml` file.
fn write_toml(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn loads_shared_section() {
    let file = write_toml(
        r#"
[shared]
log_level = "warn"
service_name = "taskmot-test"
"#,
    );
    let app = TestApp::load(file.path()).unwrap();
    assert_eq!(app.shared.log_level, LogLevel::Warn);
    assert_eq!(app.shared.service_name, "taskmot-test");
    assert!(app.shared.validate().is_ok());
}

#[test]
fn log_level_defaults_to_info() {
    let file = write_toml("[shared]\nservice_name = \"x\"\n");
    let app = TestApp::load(file.path()).unwrap();
    assert_eq!(app.shared.log_level, LogLevel::Info);
    assert_eq!(app.shared.log_level.as_directive(), "info");
}

#[test]
fn empty_service_name_fails_validation() {
    let file = write_toml("[shared]\nservice_name = \"\"\n");
    let app = TestApp::load(file.path()).unwrap();
    assert!(matches!(
        app.shared.validate(),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn missing_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    assert_eq!(TestApp::load(&path).unwrap_err(), ConfigError::FileNotFound);
    assert_eq!(TomlSource::load(&path).unwrap_err(), ConfigError::FileNotFound);
}

#[test]
fn bad_syntax_is_parse_error() {
    let file = write_toml("[shared\nservice_name = ");
    assert!(matches!(
        TestApp::load(file.path()),
        Err(ConfigError::ParseError(_))
    ));
    assert!(matches!(
        TomlSource::load(file.path()),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn machine_sections_from_file() {
    let file = write_toml(
        r#"
[TRAJ]
JOINTS = 3
JOINT_MASK = "0x7"
MAX_VELOCITY = 12.5
HOME = [0, 0, 10]
POSITION_FILE = ""

[JOINT_0]
TYPE = "LINEAR"
HOME_USE_INDEX = "YES"
HOME_IGNORE_LIMITS = false
"#,
    );
    let src = TomlSource::load(file.path()).unwrap();
    assert!(src.has_section("TRAJ"));
    assert!(!src.has_section("JOINT_4"));

    assert_eq!(src.find_i64("TRAJ", "JOINTS").unwrap(), Some(3));
    assert_eq!(src.find_i64("TRAJ", "JOINT_MASK").unwrap(), Some(7));
    assert_eq!(src.find_f64("TRAJ", "MAX_VELOCITY").unwrap(), Some(12.5));
    assert_eq!(
        src.find_f64_list("TRAJ", "HOME").unwrap(),
        Some(vec![0.0, 0.0, 10.0])
    );
    assert_eq!(src.find_string("TRAJ", "POSITION_FILE"), None);
    assert_eq!(src.find_bool("JOINT_0", "HOME_USE_INDEX").unwrap(), Some(true));
    assert_eq!(src.find_bool("JOINT_0", "HOME_IGNORE_LIMITS").unwrap(), Some(false));
    assert_eq!(src.find("JOINT_0", "TYPE").as_deref(), Some("LINEAR"));
}

#[test]
fn malformed_values_name_section_and_key() {
    let src = TomlSource::from_toml_str("[JOINT_1]\nMAX_VELOCITY = \"fast\"\n").unwrap();
    let err = src.find_f64("JOINT_1", "MAX_VELOCITY").unwrap_err();
    assert_eq!(
        err,
        ConfigError::InvalidValue {
            section: "JOINT_1".to_string(),
            key: "MAX_VELOCITY".to_string(),
            value: "fast".to_string(),
        }
    );
    assert!(err.to_string().contains("[JOINT_1] MAX_VELOCITY"));
}

#[test]
fn absent_keys_are_none() {
    let src = TomlSource::from_toml_str("[TRAJ]\nJOINTS = 1\n").unwrap();
    assert_eq!(src.find_f64("TRAJ", "MAX_ACCELERATION").unwrap(), None);
    assert_eq!(src.find_i64("JOINT_0", "HOME_SEQUENCE").unwrap(), None);
    assert_eq!(src.find("EMCMOT", "SERVO_PERIOD"), None);
}
