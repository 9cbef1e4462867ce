//! Configuration loading traits and types.
//!
//! Two layers live here:
//!
//! - [`ConfigLoader`]: typed TOML deserialization for application config
//!   (`[shared]`, `[bridge]`), identical for every binary in the workspace.
//! - [`ConfigSource`]: the key/section lookup the bridge uses for machine
//!   parameters (`TRAJ`, `JOINT_<n>`, `EMCMOT`). Values come back as strings
//!   and are parsed at the call site, the same way the supervisory stack
//!   reads its ini sections.
//!
//! # Usage
//!
//! ```rust
//! use taskmot_common::config::{ConfigSource, TomlSource};
//!
//! let source = TomlSource::from_toml_str(
//!     r#"
//! [TRAJ]
//! JOINTS = 3
//! POSITION_FILE = "position.txt"
//! "#,
//! )
//! .unwrap();
//! assert_eq!(source.find("TRAJ", "JOINTS").as_deref(), Some("3"));
//! assert_eq!(source.find_f64("TRAJ", "MAX_VELOCITY").unwrap(), None);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading and lookup.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// A required key is absent.
    #[error("Missing key [{section}] {key}")]
    MissingKey {
        /// Section name.
        section: String,
        /// Key name.
        key: String,
    },

    /// A key is present but cannot be parsed as the expected type.
    #[error("Invalid value for [{section}] {key}: '{value}'")]
    InvalidValue {
        /// Section name.
        section: String,
        /// Key name.
        key: String,
        /// Raw value as found.
        value: String,
    },
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
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

/// Common configuration fields shared across all applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "taskmot-sim-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read a file, mapping `NotFound` to [`ConfigError::FileNotFound`].
fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound
        } else {
            ConfigError::ParseError(e.to_string())
        }
    })
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = read_config_file(path)?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

/// Key/section lookup for machine parameters.
///
/// Implementations return the raw string for `key` inside `section`, or
/// `None` if either is absent. The typed helpers distinguish "absent"
/// (`Ok(None)`) from "present but malformed" (`Err(InvalidValue)`).
pub trait ConfigSource {
    /// Raw lookup.
    fn find(&self, section: &str, key: &str) -> Option<String>;

    /// Look up a floating-point value.
    fn find_f64(&self, section: &str, key: &str) -> Result<Option<f64>, ConfigError> {
        self.find(section, key)
            .map(|raw| parse_value(section, key, &raw, |s| s.parse::<f64>().ok()))
            .transpose()
    }

    /// Look up an integer value.
    fn find_i64(&self, section: &str, key: &str) -> Result<Option<i64>, ConfigError> {
        self.find(section, key)
            .map(|raw| parse_value(section, key, &raw, parse_int))
            .transpose()
    }

    /// Look up a boolean value (`1/0`, `true/false`, `yes/no`, `on/off`).
    fn find_bool(&self, section: &str, key: &str) -> Result<Option<bool>, ConfigError> {
        self.find(section, key)
            .map(|raw| parse_value(section, key, &raw, parse_bool))
            .transpose()
    }

    /// Look up a whitespace-separated list of floats.
    fn find_f64_list(&self, section: &str, key: &str) -> Result<Option<Vec<f64>>, ConfigError> {
        self.find(section, key)
            .map(|raw| {
                parse_value(section, key, &raw, |s| {
                    s.split_whitespace()
                        .map(|t| t.parse::<f64>().ok())
                        .collect::<Option<Vec<f64>>>()
                })
            })
            .transpose()
    }

    /// Look up a non-empty string value. Empty strings count as absent.
    fn find_string(&self, section: &str, key: &str) -> Option<String> {
        self.find(section, key).filter(|s| !s.trim().is_empty())
    }
}

fn parse_value<T>(
    section: &str,
    key: &str,
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, ConfigError> {
    parse(raw.trim()).ok_or_else(|| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: raw.to_string(),
    })
}

fn parse_int(s: &str) -> Option<i64> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        s.parse::<i64>().ok()
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// [`ConfigSource`] backed by a TOML document.
///
/// Top-level tables are sections; scalar values are stringified, arrays are
/// joined with single spaces (so `HOME = [0, 0, 10]` reads as `"0 0 10"`).
#[derive(Debug, Clone, Default)]
pub struct TomlSource {
    table: toml::Table,
}

impl TomlSource {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Ok(Self { table })
    }

    /// Load a TOML document from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = Self::from_toml_str(&read_config_file(path)?)?;
        tracing::debug!(
            path = %path.display(),
            sections = source.table.len(),
            "Machine parameters loaded"
        );
        Ok(source)
    }

    /// Wrap an already parsed table.
    pub fn from_table(table: toml::Table) -> Self {
        Self { table }
    }

    /// Whether `section` exists.
    pub fn has_section(&self, section: &str) -> bool {
        self.table.get(section).is_some_and(|v| v.is_table())
    }
}

fn stringify(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Array(items) => items
            .iter()
            .map(stringify)
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join(" ")),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Table(_) => None,
    }
}

impl ConfigSource for TomlSource {
    fn find(&self, section: &str, key: &str) -> Option<String> {
        self.table
            .get(section)
            .and_then(|s| s.as_table())
            .and_then(|t| t.get(key))
            .and_then(stringify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MACHINE: &str = r#"
[TRAJ]
JOINTS = 3
LINEAR_UNITS = 1.0
HOME = [0, 0, 10.5]
POSITION_FILE = ""

[JOINT_0]
TYPE = "LINEAR"
MAX_VELOCITY = 25
HOME_USE_INDEX = "YES"
JOINT_MASK = "0x7"
BAD = "fast"
"#;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::Warn.as_directive(), "warn");
    }

    #[test]
    fn test_shared_config_validation() {
        let ok = SharedConfig {
            log_level: LogLevel::Info,
            service_name: "taskmot".to_string(),
        };
        assert!(ok.validate().is_ok());

        let empty = SharedConfig {
            log_level: LogLevel::Info,
            service_name: String::new(),
        };
        assert!(matches!(
            empty.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_config_loader_file_not_found() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct TestConfig {
            value: String,
        }

        let result = TestConfig::load(Path::new("/nonexistent/path/taskmot.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_config_loader_parse_error() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct TestConfig {
            value: String,
        }

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = TestConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn scalar_values_are_stringified() {
        let src = TomlSource::from_toml_str(MACHINE).unwrap();
        assert_eq!(src.find("TRAJ", "JOINTS").as_deref(), Some("3"));
        assert_eq!(src.find("TRAJ", "LINEAR_UNITS").as_deref(), Some("1"));
        assert_eq!(src.find("TRAJ", "HOME").as_deref(), Some("0 0 10.5"));
        assert_eq!(src.find("JOINT_0", "TYPE").as_deref(), Some("LINEAR"));
        assert!(src.find("JOINT_1", "TYPE").is_none());
        assert!(src.has_section("JOINT_0"));
        assert!(!src.has_section("JOINT_4"));
    }

    #[test]
    fn typed_helpers() {
        let src = TomlSource::from_toml_str(MACHINE).unwrap();
        assert_eq!(src.find_f64("JOINT_0", "MAX_VELOCITY").unwrap(), Some(25.0));
        assert_eq!(src.find_i64("JOINT_0", "JOINT_MASK").unwrap(), Some(7));
        assert_eq!(src.find_bool("JOINT_0", "HOME_USE_INDEX").unwrap(), Some(true));
        assert_eq!(
            src.find_f64_list("TRAJ", "HOME").unwrap(),
            Some(vec![0.0, 0.0, 10.5])
        );
        assert_eq!(src.find_f64("JOINT_0", "MISSING").unwrap(), None);
        assert!(src.find_string("TRAJ", "POSITION_FILE").is_none());
    }

    #[test]
    fn malformed_value_is_reported() {
        let src = TomlSource::from_toml_str(MACHINE).unwrap();
        let err = src.find_f64("JOINT_0", "BAD").unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                section: "JOINT_0".to_string(),
                key: "BAD".to_string(),
                value: "fast".to_string(),
            }
        );
    }
}
