//! TOML-based configuration persistence for the VaultPair client.
//!
//! Reads and writes `AppConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\VaultPair\config.toml`
//! - Linux:    `~/.config/vaultpair/config.toml`
//! - macOS:    `~/Library/Application Support/VaultPair/config.toml`
//!
//! Example:
//!
//! ```toml
//! [device]
//! name = "my-laptop"
//! log_level = "info"
//!
//! [pairing]
//! status_poll_ms = 500
//! connect_timeout_secs = 30
//!
//! [qr]
//! frames_per_second = 15
//! ```
//!
//! # Serde default values
//!
//! Every section and every field has a default, so the client works on first
//! run (no file at all) and with a partial file that only overrides a few
//! values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::pairing_session::PairingTimings;
use crate::application::qr_export::QrTimings;

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

/// Top-level client configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub pairing: PairingConfig,
    #[serde(default)]
    pub qr: QrConfig,
}

/// This device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    /// Name shown to peers during discovery.
    #[serde(default = "default_device_name")]
    pub name: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Poll cadences and phase deadlines of a pairing session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PairingConfig {
    #[serde(default = "default_status_poll_ms")]
    pub status_poll_ms: u64,
    #[serde(default = "default_discovery_poll_ms")]
    pub discovery_poll_ms: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_verification_timeout_secs")]
    pub verification_timeout_secs: u64,
    #[serde(default = "default_transfer_timeout_secs")]
    pub transfer_timeout_secs: u64,
}

/// Animated-QR export playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QrConfig {
    #[serde(default = "default_frames_per_second")]
    pub frames_per_second: u32,
    #[serde(default = "default_frame_retry_base_ms")]
    pub frame_retry_base_ms: u64,
    #[serde(default = "default_frame_retry_max_ms")]
    pub frame_retry_max_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_device_name() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "vaultpair-device".to_string())
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_status_poll_ms() -> u64 {
    500
}
fn default_discovery_poll_ms() -> u64 {
    1000
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_verification_timeout_secs() -> u64 {
    120
}
fn default_transfer_timeout_secs() -> u64 {
    60
}
fn default_frames_per_second() -> u32 {
    15
}
fn default_frame_retry_base_ms() -> u64 {
    100
}
fn default_frame_retry_max_ms() -> u64 {
    2000
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            status_poll_ms: default_status_poll_ms(),
            discovery_poll_ms: default_discovery_poll_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            verification_timeout_secs: default_verification_timeout_secs(),
            transfer_timeout_secs: default_transfer_timeout_secs(),
        }
    }
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            frames_per_second: default_frames_per_second(),
            frame_retry_base_ms: default_frame_retry_base_ms(),
            frame_retry_max_ms: default_frame_retry_max_ms(),
        }
    }
}

impl PairingConfig {
    /// Converts to the controller's timings.  Zero poll periods are raised to
    /// one millisecond.
    pub fn timings(&self) -> PairingTimings {
        PairingTimings {
            status_poll: Duration::from_millis(self.status_poll_ms.max(1)),
            discovery_poll: Duration::from_millis(self.discovery_poll_ms.max(1)),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            verification_timeout: Duration::from_secs(self.verification_timeout_secs),
            transfer_timeout: Duration::from_secs(self.transfer_timeout_secs),
        }
    }
}

impl QrConfig {
    pub fn timings(&self) -> QrTimings {
        QrTimings {
            frames_per_second: self.frames_per_second,
            retry_base: Duration::from_millis(self.frame_retry_base_ms),
            retry_max: Duration::from_millis(self.frame_retry_max_ms),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the platform config file, returning
/// `AppConfig::default()` if the file does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from `path`; a missing file yields the defaults.
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to the platform config file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Same as [`save_config`].
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
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
    })?;
    Ok(())
}

/// Resolves the platform config directory including the `VaultPair`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("VaultPair"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("vaultpair"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("VaultPair")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
