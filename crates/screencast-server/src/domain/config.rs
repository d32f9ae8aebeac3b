//! Server configuration types.
//!
//! [`ServerConfig`] is the single source of truth for runtime settings.  It is
//! assembled in `main.rs` from CLI flags, environment variables and the TOML
//! config file (see `infrastructure::storage::config`), then validated once
//! before the server starts.

use std::time::Duration;

use screencast_core::DEFAULT_IMAGE_QUALITY;
use thiserror::Error;

/// Default listening host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8765;

/// Default pause between broadcast cycles, in seconds.
pub const DEFAULT_INTERVAL_SECS: f64 = 200.0;

/// A configuration value failed validation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("host must not be empty")]
    EmptyHost,

    #[error("image quality {0} is outside 0-100")]
    InvalidQuality(u8),

    #[error("interval {0}s must be a finite, non-negative number of seconds")]
    InvalidInterval(f64),
}

/// All runtime configuration for the broadcast server.
///
/// # Example
///
/// ```rust
/// use screencast_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.port, 8765);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Host name or IP address to listen on.  Resolved at bind time, so
    /// `localhost` is accepted.
    pub host: String,

    /// TCP port to listen on.  `0` asks the OS for an ephemeral port.
    pub port: u16,

    /// Pause between the end of one broadcast cycle and the start of the next.
    pub interval: Duration,

    /// JPEG quality factor on a 0–100 scale.
    pub image_quality: u8,

    /// Monitor to capture, in enumeration order.  `None` selects the primary
    /// monitor.
    pub monitor_index: Option<usize>,
}

impl Default for ServerConfig {
    /// | Field          | Default       |
    /// |----------------|---------------|
    /// | host           | `localhost`   |
    /// | port           | `8765`        |
    /// | interval       | 200 seconds   |
    /// | image_quality  | `50`          |
    /// | monitor_index  | primary       |
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            interval: Duration::from_secs_f64(DEFAULT_INTERVAL_SECS),
            image_quality: DEFAULT_IMAGE_QUALITY,
            monitor_index: None,
        }
    }
}

impl ServerConfig {
    /// Checks every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.image_quality > 100 {
            return Err(ConfigError::InvalidQuality(self.image_quality));
        }
        Ok(())
    }

    /// Human-readable `host:port` for log lines.
    pub fn listen_label(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Converts a (possibly fractional) number of seconds into an interval.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidInterval`] for negative, NaN or infinite
/// values, or values too large to represent as a [`Duration`].
pub fn interval_from_secs(secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::InvalidInterval(secs));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidInterval(secs))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
