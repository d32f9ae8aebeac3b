//! Application layer for screencast-server.
//!
//! Knows *what* happens on each broadcast cycle and *when* a client leaves,
//! but delegates *how* (sockets, timers, screen capture) to implementations
//! of the traits defined here and in `screencast-core`.
//!
//! # Responsibilities
//!
//! - Owning the registry of connected clients ([`ClientRegistry`])
//! - Running one capture-and-fan-out cycle ([`Broadcaster`])
//! - Pacing cycles through a cancellable [`Ticker`]
//! - Supervising one connection's cycle loop ([`run_broadcast_cycles`])
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or performing the WebSocket handshake
//! - Calling OS capture APIs
//! - Reading configuration files

pub mod broadcast;
pub mod registry;
pub mod session;
pub mod ticker;

pub use broadcast::{Broadcaster, CycleFault, CycleOutcome};
pub use registry::{BroadcastReport, ClientRegistry, FrameSink, SendError};
pub use session::{run_broadcast_cycles, SessionEnd};
pub use ticker::{IntervalTicker, ManualTicker, ManualTrigger, Ticker};
