//! Per-connection lifecycle.
//!
//! Every accepted viewer connection moves through three states:
//!
//! ```text
//!             begin cycle             cycle done
//! Connected ───────────────▶ Sending ───────────▶ Connected ─▶ (sleep) ─▶ …
//!     │                          │
//!     └──────────┬───────────────┘
//!                ▼  send failure / closure / shutdown
//!          Disconnected  (terminal)
//! ```
//!
//! The machine is tracked by the connection's own task; other tasks never
//! observe it.  Its job is to make illegal orderings (e.g. sending after a
//! disconnect) detectable rather than silent.

use thiserror::Error;
use uuid::Uuid;

/// Identity of one accepted connection.  Fresh for every accept, never reused.
pub type ClientId = Uuid;

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Registered and idle between cycles.
    Connected,
    /// A broadcast cycle is running on behalf of this connection.
    Sending,
    /// Terminal: the connection is gone and removed from the registry.
    Disconnected,
}

/// An illegal state transition was requested.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid transition {from:?} -> {to:?} for client {client_id}")]
pub struct LifecycleError {
    pub client_id: ClientId,
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// State machine for a single connection.
#[derive(Debug)]
pub struct ConnectionLifecycle {
    client_id: ClientId,
    state: ConnectionState,
}

impl ConnectionLifecycle {
    /// Starts a lifecycle in [`ConnectionState::Connected`].
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            state: ConnectionState::Connected,
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Connected → Sending.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] from any state other than `Connected`.
    pub fn begin_send(&mut self) -> Result<(), LifecycleError> {
        self.transition(ConnectionState::Connected, ConnectionState::Sending)
    }

    /// Sending → Connected.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] from any state other than `Sending`.
    pub fn finish_send(&mut self) -> Result<(), LifecycleError> {
        self.transition(ConnectionState::Sending, ConnectionState::Connected)
    }

    /// Moves to the terminal state.  Idempotent.
    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    pub fn is_disconnected(&self) -> bool {
        self.state == ConnectionState::Disconnected
    }

    fn transition(
        &mut self,
        expected: ConnectionState,
        to: ConnectionState,
    ) -> Result<(), LifecycleError> {
        if self.state != expected {
            return Err(LifecycleError {
                client_id: self.client_id,
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
