//! screencast-server library crate.
//!
//! Captures a display on a fixed interval and broadcasts each frame, as a
//! JSON text message, to every connected WebSocket viewer.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Viewer (JSON over WebSocket)
//!         ↕
//! [screencast-server]
//!   ├── domain/           Pure types: ServerConfig, connection lifecycle
//!   ├── application/      Client registry, broadcast cycle, ticker, session loop
//!   └── infrastructure/
//!         ├── capture/    Display capture (xcap) and a mock frame source
//!         ├── ws_server/  WebSocket accept loop (tokio-tungstenite)
//!         └── storage/    TOML configuration file
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `screencast-core`, and reaches the
//!   outside world only through the [`application::FrameSink`],
//!   [`application::Ticker`] and [`screencast_core::FrameSource`] traits.
//! - `infrastructure` implements those traits with real sockets, timers and
//!   capture APIs.

/// Domain layer: configuration and connection lifecycle (no I/O).
pub mod domain;

/// Application layer: registry, broadcast cycle, and per-connection loop.
pub mod application;

/// Infrastructure layer: capture backends, WebSocket server, config file.
pub mod infrastructure;
