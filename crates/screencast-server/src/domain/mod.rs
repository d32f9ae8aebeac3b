//! Domain layer for screencast-server.
//!
//! Pure types with no dependencies on I/O, sockets, or the async runtime.
//!
//! - Configuration structures and their validation rules
//! - The per-connection lifecycle state machine
//! - Client identity

pub mod config;
pub mod session;

pub use config::{ConfigError, ServerConfig};
pub use session::{ClientId, ConnectionLifecycle, ConnectionState, LifecycleError};
