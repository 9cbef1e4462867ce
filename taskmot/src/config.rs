//! Application configuration.
//!
//! One TOML file carries both layers: `[shared]` and `[bridge]` deserialize
//! into [`AppConfig`]; the machine sections (`TRAJ`, `JOINT_<n>`, `EMCMOT`)
//! are served to the bridge through [`TomlSource`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use taskmot_common::config::{ConfigError, ConfigLoader, SharedConfig, TomlSource};
use taskmot_common::consts::TRAJ_SECTION;
use taskmot_common::flags::DebugFlags;

// ─── App Config ─────────────────────────────────────────────────────

/// Supervisory loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Supervisory cycle period [µs].
    pub cycle_time_us: u64,
    /// Read the extended debug snapshot each cycle.
    pub debug_info: bool,
    /// Raw [`DebugFlags`] bits.
    pub debug_flags: u32,
    /// Stop after this many cycles; run until interrupted if absent.
    pub cycles: Option<u64>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            cycle_time_us: 1000,
            debug_info: false,
            debug_flags: 0,
            cycles: None,
        }
    }
}

impl BridgeSettings {
    pub fn cycle_time(&self) -> Duration {
        Duration::from_micros(self.cycle_time_us)
    }

    pub fn debug_flags(&self) -> DebugFlags {
        DebugFlags::from_bits_truncate(self.debug_flags)
    }
}

/// `taskmot.toml` application sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub shared: SharedConfig,
    #[serde(default)]
    pub bridge: BridgeSettings,
}

impl AppConfig {
    /// # Errors
    ///
    /// `ValidationError` for an empty service name, a zero cycle time or
    /// unknown debug bits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        if self.bridge.cycle_time_us == 0 {
            return Err(ConfigError::ValidationError(
                "bridge.cycle_time_us must be positive".to_string(),
            ));
        }
        if DebugFlags::from_bits(self.bridge.debug_flags).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "bridge.debug_flags {:#x} has unknown bits",
                self.bridge.debug_flags
            )));
        }
        Ok(())
    }
}

// ─── Loaded Config Bundle ───────────────────────────────────────────

/// Validated application config plus the machine parameter source.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub app: AppConfig,
    pub machine: TomlSource,
}

/// Load and validate `path`.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let app = AppConfig::load(path)?;
    let machine = TomlSource::load(path)?;
    finish(app, machine)
}

/// Load from a TOML string (for testing).
pub fn load_config_from_str(content: &str) -> Result<LoadedConfig, ConfigError> {
    let app: AppConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    let machine = TomlSource::from_toml_str(content)?;
    finish(app, machine)
}

fn finish(app: AppConfig, machine: TomlSource) -> Result<LoadedConfig, ConfigError> {
    app.validate()?;
    if !machine.has_section(TRAJ_SECTION) {
        return Err(ConfigError::ValidationError(format!(
            "missing [{TRAJ_SECTION}] section"
        )));
    }
    Ok(LoadedConfig { app, machine })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use taskmot_common::config::LogLevel;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[shared]
service_name = "taskmot-test"

[TRAJ]
JOINTS = 3
"#;

    #[test]
    fn bridge_defaults() {
        let loaded = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(loaded.app.bridge, BridgeSettings::default());
        assert_eq!(loaded.app.shared.log_level, LogLevel::Info);
        assert_eq!(loaded.app.bridge.cycle_time(), Duration::from_millis(1));
    }

    #[test]
    fn bridge_overrides() {
        let loaded = load_config_from_str(
            r#"
[shared]
service_name = "taskmot"
log_level = "debug"

[bridge]
cycle_time_us = 500
debug_info = true
debug_flags = 0x100
cycles = 20

[TRAJ]
JOINTS = 1
"#,
        )
        .unwrap();
        let b = &loaded.app.bridge;
        assert_eq!(b.cycle_time_us, 500);
        assert!(b.debug_info);
        assert_eq!(b.debug_flags(), DebugFlags::MOTION_TIME);
        assert_eq!(b.cycles, Some(20));
    }

    #[test]
    fn rejects_unknown_debug_bits() {
        let content = MINIMAL.replace("[TRAJ]", "[bridge]\ndebug_flags = 1\n\n[TRAJ]");
        assert!(matches!(
            load_config_from_str(&content),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn requires_traj_section() {
        let content = "[shared]\nservice_name = \"x\"\n";
        assert!(matches!(
            load_config_from_str(content),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let loaded = load_config(file.path()).unwrap();
        assert_eq!(loaded.app.shared.service_name, "taskmot-test");
        assert!(loaded.machine.has_section("TRAJ"));

        assert!(matches!(
            load_config(Path::new("/nonexistent/taskmot.toml")),
            Err(ConfigError::FileNotFound)
        ));
    }

    #[test]
    fn sample_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/taskmot.toml");
        load_config(&path).unwrap();
    }
}
