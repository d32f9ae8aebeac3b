//! Infrastructure layer for screencast-server.
//!
//! Concrete implementations of the seams the application layer defines:
//!
//! - [`capture`]: [`screencast_core::FrameSource`] backends (xcap and a mock)
//! - [`ws_server`]: the TCP accept loop and the WebSocket [`crate::application::FrameSink`]
//! - [`storage`]: the TOML configuration file

pub mod capture;
pub mod storage;
pub mod ws_server;

pub use capture::{describe_monitors, DisplayFrameSource, MockFrameSource, MonitorSummary};
pub use ws_server::{ScreencastServer, WsFrameSink};
