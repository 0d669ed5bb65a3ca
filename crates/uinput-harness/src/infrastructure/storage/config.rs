//! TOML-based configuration for the registration harness.
//!
//! The default location is `$XDG_CONFIG_HOME/uinput-harness/config.toml`
//! (falling back to `~/.config/uinput-harness/config.toml`).  Any path can be
//! given instead with `--config`.
//!
//! ```toml
//! [harness]
//! log_level = "info"
//! registration_timeout_secs = 20
//!
//! [transport]
//! program = "adb"
//! args = ["shell", "uinput", "-"]
//! serial = "emulator-5554"
//!
//! [monitor]
//! source = "adb"
//! poll_interval_ms = 100
//!
//! [[devices]]
//! name = "Test Keyboard"
//! vendor_id = 0x18d1
//! product_id = 0x4e31
//! kind = "keyboard"
//! ```
//!
//! # Serde default values
//!
//! Every field has a `#[serde(default = "...")]`, so an empty file (or no file
//! at all) yields a working configuration that talks to the single device
//! `adb` picks by default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uinput_core::{CommandError, DeviceKind, VirtualDeviceSpec};

use crate::infrastructure::event_source::monitor::MIN_POLL_INTERVAL;
use crate::infrastructure::event_source::proc_devices::PROC_INPUT_DEVICES;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level harness configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HarnessConfig {
    #[serde(default)]
    pub harness: HarnessSection,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

/// General harness behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessSection {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// How long one registration may wait for its device to appear.
    #[serde(default = "default_registration_timeout_secs")]
    pub registration_timeout_secs: u64,
}

/// The program whose stdin receives uinput commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportConfig {
    #[serde(default = "default_adb_program")]
    pub program: String,
    #[serde(default = "default_transport_args")]
    pub args: Vec<String>,
    /// Target device serial; passed to adb as `-s <serial>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

/// Where device-added/removed events come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorSource {
    /// Poll `/proc/bus/input/devices` on the target through `adb shell`.
    Adb,
    /// Poll the listing file on this machine.
    Local,
}

/// Device-event monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_source")]
    pub source: MonitorSource,
    #[serde(default = "default_adb_program")]
    pub adb_program: String,
    /// Overrides the transport serial for the monitor when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Listing file read by the `local` source.
    #[serde(default = "default_listing_path")]
    pub path: PathBuf,
}

/// One virtual device the `register` subcommand creates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceEntry {
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    #[serde(default = "default_device_kind")]
    pub kind: DeviceKind,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_registration_timeout_secs() -> u64 {
    20
}
fn default_adb_program() -> String {
    "adb".to_string()
}
fn default_transport_args() -> Vec<String> {
    vec!["shell".to_string(), "uinput".to_string(), "-".to_string()]
}
fn default_monitor_source() -> MonitorSource {
    MonitorSource::Adb
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_listing_path() -> PathBuf {
    PathBuf::from(PROC_INPUT_DEVICES)
}
fn default_device_kind() -> DeviceKind {
    DeviceKind::Keyboard
}

impl Default for HarnessSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            registration_timeout_secs: default_registration_timeout_secs(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            program: default_adb_program(),
            args: default_transport_args(),
            serial: None,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            source: default_monitor_source(),
            adb_program: default_adb_program(),
            serial: None,
            poll_interval_ms: default_poll_interval_ms(),
            path: default_listing_path(),
        }
    }
}

impl HarnessSection {
    pub fn registration_timeout(&self) -> Duration {
        Duration::from_secs(self.registration_timeout_secs)
    }
}

impl TransportConfig {
    /// Returns the program and its full argument list.
    ///
    /// When a serial is configured, `-s <serial>` is placed in front of the
    /// configured arguments, which is where adb expects its global options.
    pub fn command_line(&self) -> (String, Vec<String>) {
        let mut args = Vec::with_capacity(self.args.len() + 2);
        if let Some(serial) = &self.serial {
            args.push("-s".to_string());
            args.push(serial.clone());
        }
        args.extend(self.args.iter().cloned());
        (self.program.clone(), args)
    }
}

impl MonitorConfig {
    /// The configured interval, never below [`MIN_POLL_INTERVAL`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }
}

impl DeviceEntry {
    /// Builds the registrable spec for this entry using uinput device `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if the entry has an empty name.
    pub fn to_spec(&self, id: u32) -> Result<VirtualDeviceSpec, CommandError> {
        VirtualDeviceSpec::from_template(id, &self.name, self.vendor_id, self.product_id, self.kind)
    }
}

impl HarnessConfig {
    /// A starter configuration with one keyboard, written by `init-config`.
    pub fn example() -> Self {
        Self {
            devices: vec![DeviceEntry {
                name: "Test Keyboard".to_string(),
                vendor_id: 0x18d1,
                product_id: 0x4e31,
                kind: DeviceKind::Keyboard,
            }],
            ..Self::default()
        }
    }

    /// Serial the monitor should target: its own override, else the
    /// transport's.
    pub fn monitor_serial(&self) -> Option<&str> {
        self.monitor
            .serial
            .as_deref()
            .or(self.transport.serial.as_deref())
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when neither
/// `XDG_CONFIG_HOME` nor `HOME` is set.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from the default path.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<HarnessConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `HarnessConfig` from `path`, returning the defaults if the file does
/// not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<HarnessConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HarnessConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &HarnessConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("uinput-harness"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("uinput_harness_test_{}", Uuid::new_v4()))
            .join("config.toml")
    }

    #[test]
    fn test_default_config_targets_adb_uinput() {
        // Arrange / Act
        let cfg = HarnessConfig::default();

        // Assert
        assert_eq!(cfg.transport.program, "adb");
        assert_eq!(cfg.transport.args, ["shell", "uinput", "-"]);
        assert_eq!(cfg.monitor.source, MonitorSource::Adb);
        assert_eq!(cfg.harness.registration_timeout(), Duration::from_secs(20));
        assert_eq!(cfg.monitor.poll_interval(), Duration::from_millis(100));
        assert!(cfg.devices.is_empty());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: HarnessConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, HarnessConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides_only_given_fields() {
        // Arrange
        let toml_str = r#"
[harness]
registration_timeout_secs = 5

[monitor]
source = "local"

[[devices]]
name = "pad"
vendor_id = 0x045e
product_id = 0x028e
kind = "gamepad"

[[devices]]
name = "kbd"
vendor_id = 1
product_id = 2
"#;

        // Act
        let cfg: HarnessConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.harness.registration_timeout_secs, 5);
        assert_eq!(cfg.harness.log_level, "info");
        assert_eq!(cfg.monitor.source, MonitorSource::Local);
        assert_eq!(cfg.monitor.path, PathBuf::from(PROC_INPUT_DEVICES));
        assert_eq!(cfg.devices.len(), 2);
        assert_eq!(cfg.devices[0].kind, DeviceKind::Gamepad);
        assert_eq!(cfg.devices[0].vendor_id, 0x045e);
        assert_eq!(cfg.devices[1].kind, DeviceKind::Keyboard, "kind defaults to keyboard");
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        // Arrange
        let cfg: HarnessConfig =
            toml::from_str("[monitor]\npoll_interval_ms = 0\n").expect("deserialize");

        // Act
        let interval = cfg.monitor.poll_interval();

        // Assert
        assert_eq!(interval, MIN_POLL_INTERVAL);
    }

    #[test]
    fn test_unknown_monitor_source_is_a_parse_error() {
        let result: Result<HarnessConfig, _> = toml::from_str("[monitor]\nsource = \"udev\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_command_line_puts_serial_before_configured_args() {
        // Arrange
        let transport = TransportConfig {
            serial: Some("emulator-5554".to_string()),
            ..TransportConfig::default()
        };

        // Act
        let (program, args) = transport.command_line();

        // Assert
        assert_eq!(program, "adb");
        assert_eq!(args, ["-s", "emulator-5554", "shell", "uinput", "-"]);
    }

    #[test]
    fn test_command_line_without_serial_is_unchanged() {
        let (_, args) = TransportConfig::default().command_line();
        assert_eq!(args, ["shell", "uinput", "-"]);
    }

    #[test]
    fn test_monitor_serial_falls_back_to_transport_serial() {
        let mut cfg = HarnessConfig::default();
        cfg.transport.serial = Some("A".to_string());
        assert_eq!(cfg.monitor_serial(), Some("A"));

        cfg.monitor.serial = Some("B".to_string());
        assert_eq!(cfg.monitor_serial(), Some("B"));
    }

    #[test]
    fn test_device_entry_builds_matching_spec() {
        // Arrange
        let entry = DeviceEntry {
            name: "kbd1".to_string(),
            vendor_id: 1,
            product_id: 1,
            kind: DeviceKind::Keyboard,
        };

        // Act
        let spec = entry.to_spec(3).expect("valid entry");

        // Assert
        assert_eq!(spec.name(), "kbd1");
        assert_eq!(spec.vendor_id(), 1);
        assert!(spec.registration_command().ends_with(b"\n"));
    }

    #[test]
    fn test_load_config_from_missing_file_returns_default() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");

        let cfg = load_config_from(&path).expect("missing file is not an error");

        assert_eq!(cfg, HarnessConfig::default());
    }

    #[test]
    fn test_load_config_from_malformed_file_returns_parse_error() {
        // Arrange
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        // Act
        let result = load_config_from(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_save_and_load_round_trip_via_temp_dir() {
        // Arrange
        let path = temp_path();
        let mut cfg = HarnessConfig::example();
        cfg.transport.serial = Some("R58M123".to_string());
        cfg.harness.log_level = "debug".to_string();

        // Act
        save_config_to(&cfg, &path).expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("uinput-harness/config.toml"), "got {path:?}");
        }
    }
}
