//! Screencast server: entry point.
//!
//! Captures a display on a fixed interval and pushes every frame to all
//! connected WebSocket viewers as `{"type":"image","data":"<base64 JPEG>"}`.
//!
//! # Usage
//!
//! ```text
//! screencast-server [OPTIONS]
//!
//! Options:
//!   --host <HOST>                 Listen host [default: localhost]
//!   --port <PORT>                 Listen port [default: 8765]
//!   --interval-seconds <SECS>     Pause between cycles [default: 200]
//!   --image-quality <0-100>       JPEG quality [default: 50]
//!   --monitor-index <N>           Monitor to capture [default: primary]
//!   --config <PATH>               Config file [default: platform config dir]
//!   --init-config                 Write the effective config and exit
//!   --list-monitors               Print attached monitors and exit
//! ```
//!
//! # Precedence
//!
//! CLI flag, then environment variable, then config file, then built-in
//! default.
//!
//! | Variable              | Setting            |
//! |-----------------------|--------------------|
//! | `SCREENCAST_HOST`     | listen host        |
//! | `SCREENCAST_PORT`     | listen port        |
//! | `SCREENCAST_INTERVAL` | interval (seconds) |
//! | `SCREENCAST_QUALITY`  | JPEG quality       |
//! | `SCREENCAST_MONITOR`  | monitor index      |
//! | `SCREENCAST_CONFIG`   | config file path   |
//! | `RUST_LOG`            | log filter; overrides `[logging] level` |

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use screencast_server::domain::ServerConfig;
use screencast_server::infrastructure::storage::{
    config_file_path, load_config, save_config, ConfigFileError, FileConfig,
};
use screencast_server::infrastructure::{describe_monitors, DisplayFrameSource, ScreencastServer};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Screen capture broadcast server.
///
/// Options left unset fall back to the config file, then to built-in defaults.
#[derive(Debug, Parser)]
#[command(
    name = "screencast-server",
    about = "Broadcasts periodic screen captures to WebSocket viewers",
    version
)]
struct Cli {
    /// Host name or IP address to listen on.
    #[arg(long, env = "SCREENCAST_HOST")]
    host: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "SCREENCAST_PORT")]
    port: Option<u16>,

    /// Seconds to wait between broadcast cycles.  Fractions are allowed.
    #[arg(long, env = "SCREENCAST_INTERVAL")]
    interval_seconds: Option<f64>,

    /// JPEG quality factor, 0–100.
    #[arg(long, env = "SCREENCAST_QUALITY", value_parser = clap::value_parser!(u8).range(0..=100))]
    image_quality: Option<u8>,

    /// Monitor to capture, as listed by `--list-monitors`.
    #[arg(long, env = "SCREENCAST_MONITOR")]
    monitor_index: Option<usize>,

    /// Path of the TOML config file.
    #[arg(long, env = "SCREENCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Write the effective configuration to the config file and exit.
    #[arg(long)]
    init_config: bool,

    /// Print the attached monitors and exit.
    #[arg(long)]
    list_monitors: bool,
}

impl Cli {
    /// Overlays the flags that were given onto the file configuration and
    /// validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if any merged value is out of range.
    fn resolve(&self, file: &FileConfig) -> anyhow::Result<ServerConfig> {
        self.merged(file)
            .to_server_config()
            .context("invalid configuration")
    }

    fn merged(&self, file: &FileConfig) -> FileConfig {
        let mut merged = file.clone();
        if let Some(host) = &self.host {
            merged.server.host = host.clone();
        }
        if let Some(port) = self.port {
            merged.server.port = port;
        }
        if let Some(secs) = self.interval_seconds {
            merged.capture.interval_seconds = secs;
        }
        if let Some(quality) = self.image_quality {
            merged.capture.image_quality = quality;
        }
        if self.monitor_index.is_some() {
            merged.capture.monitor_index = self.monitor_index;
        }
        merged
    }

    /// The explicit `--config` path, or the platform default.
    fn config_path(&self) -> Result<PathBuf, ConfigFileError> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config_file_path(),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The config file is read before logging starts because it may carry the
    // log level.
    let config_path = cli.config_path();
    let file_config = match &config_path {
        Ok(path) => load_config(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        Err(_) => FileConfig::default(),
    };

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&file_config.logging.level)),
        )
        .init();

    if let Err(e) = &config_path {
        warn!("{e}; using built-in defaults");
    }

    if cli.list_monitors {
        let monitors = describe_monitors().context("failed to enumerate monitors")?;
        for m in monitors {
            println!(
                "{}: {} {}x{}{}",
                m.index,
                m.name,
                m.width,
                m.height,
                if m.is_primary { " (primary)" } else { "" }
            );
        }
        return Ok(());
    }

    let config = cli.resolve(&file_config)?;

    if cli.init_config {
        let path = config_path.context("no config path; pass --config")?;
        let effective = FileConfig::from_server_config(&config, &file_config.logging.level);
        save_config(&path, &effective)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        info!("wrote configuration to {}", path.display());
        return Ok(());
    }

    info!(
        "screencast server starting on {} (interval={:?}, quality={}, monitor={})",
        config.listen_label(),
        config.interval,
        config.image_quality,
        config
            .monitor_index
            .map_or_else(|| "primary".to_string(), |i| i.to_string())
    );

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    let source = Arc::new(DisplayFrameSource::new(
        config.monitor_index,
        config.image_quality,
    ));
    let server = ScreencastServer::bind(&config, source).await?;
    server.run(running).await?;

    info!("screencast server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
