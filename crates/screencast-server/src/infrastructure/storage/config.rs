//! TOML configuration file.
//!
//! Default locations:
//! - Windows:  `%APPDATA%\Screencast\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/screencast/config.toml` (or `~/.config/...`)
//! - macOS:    `~/Library/Application Support/Screencast/config.toml`
//!
//! ```toml
//! [server]
//! host = "localhost"
//! port = 8765
//!
//! [capture]
//! interval_seconds = 200
//! image_quality = 50
//! # monitor_index = 1   # omit for the primary monitor
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every section and key is optional; missing values take their defaults, so
//! an absent file and an empty file behave the same.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{
    interval_from_secs, ConfigError, ServerConfig, DEFAULT_HOST, DEFAULT_INTERVAL_SECS,
    DEFAULT_PORT,
};
use screencast_core::DEFAULT_IMAGE_QUALITY;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigFileError {
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

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub capture: CaptureSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Listening socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Frame capture and pacing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureSection {
    /// Seconds between cycles; fractions allowed.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: f64,
    /// JPEG quality, 0–100.
    #[serde(default = "default_image_quality")]
    pub image_quality: u8,
    /// Monitor to capture; absent selects the primary monitor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_index: Option<usize>,
}

/// Log output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// `tracing` filter used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"screencast_server=debug"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_interval_seconds() -> f64 {
    DEFAULT_INTERVAL_SECS
}
fn default_image_quality() -> u8 {
    DEFAULT_IMAGE_QUALITY
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            image_quality: default_image_quality(),
            monitor_index: None,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl FileConfig {
    /// Converts the file representation into a validated [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a value is out of range.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let config = ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            interval: interval_from_secs(self.capture.interval_seconds)?,
            image_quality: self.capture.image_quality,
            monitor_index: self.capture.monitor_index,
        };
        config.validate()?;
        Ok(config)
    }

    /// Builds the file representation of an effective configuration.
    pub fn from_server_config(config: &ServerConfig, log_level: &str) -> Self {
        Self {
            server: ServerSection {
                host: config.host.clone(),
                port: config.port,
            },
            capture: CaptureSection {
                interval_seconds: config.interval.as_secs_f64(),
                image_quality: config.image_quality,
                monitor_index: config.monitor_index,
            },
            logging: LoggingSection {
                level: log_level.to_string(),
            },
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the default path of the config file.
///
/// # Errors
///
/// Returns [`ConfigFileError::NoPlatformConfigDir`] if the base directory
/// cannot be determined from the environment.
pub fn config_file_path() -> Result<PathBuf, ConfigFileError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigFileError::NoPlatformConfigDir)
}

/// Loads the config file at `path`, returning defaults if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigFileError::Io`] for file-system errors other than "not
/// found", and [`ConfigFileError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigFileError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(source) => Err(ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigFileError::Io`] for file-system failures or
/// [`ConfigFileError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &FileConfig) -> Result<(), ConfigFileError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigFileError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigFileError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Screencast"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("screencast"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Screencast")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
