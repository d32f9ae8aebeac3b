//! The client registry: the authoritative set of connected viewers.
//!
//! A client is present in the registry if and only if its connection is
//! believed to be open.  The accept path inserts, the connection's own task
//! removes on termination, and a broadcast removes any client whose send
//! failed.
//!
//! # Locking discipline
//!
//! Membership lives behind a `tokio::sync::RwLock`.  A broadcast takes a
//! snapshot of the members under the read lock and releases it before any
//! network I/O, so a slow viewer never blocks joins or leaves.  Each sink has
//! its own mutex so that two cycles never interleave writes on one socket.
//!
//! Consequences:
//!
//! - A client removed before the snapshot receives nothing from that cycle.
//! - A client removed while the sends are in flight receives at most one
//!   more frame.
//! - A client inserted after the snapshot waits for the next cycle.
//!
//! Leaving the registry, by removal or eviction, fires the client's
//! [`ClientRegistry::departure`] signal so its session can stop waiting.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use thiserror::Error;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ClientId;

/// Why a send to one client failed.
///
/// Both variants lead to the same outcome: the client is evicted.  They are
/// kept apart so logs can distinguish a normal hang-up from a broken socket.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    /// The peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Outbound half of one client connection.
///
/// The WebSocket implementation lives in `infrastructure::ws_server`; tests
/// use recording doubles.
#[async_trait]
pub trait FrameSink: Send {
    /// Sends one text message.
    async fn send_text(&mut self, text: String) -> Result<(), SendError>;

    /// Closes the outbound half.  Best effort; errors are swallowed.
    async fn close(&mut self);
}

/// A sink shared between the registry and in-flight broadcasts.
pub type SharedSink = Arc<Mutex<Box<dyn FrameSink>>>;

struct ClientEntry {
    peer_addr: SocketAddr,
    sink: SharedSink,
    departed: Arc<Notify>,
}

/// Result of fanning one message out to the registry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients that accepted the message.
    pub delivered: Vec<ClientId>,
    /// Clients whose send failed and that were removed.
    pub evicted: Vec<ClientId>,
}

impl BroadcastReport {
    /// Number of clients the message was attempted on.
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.evicted.len()
    }
}

/// Concurrency-safe set of connected clients, keyed by [`ClientId`].
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<ClientId, ClientEntry>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly accepted connection and returns its identity.
    pub async fn insert(&self, peer_addr: SocketAddr, sink: Box<dyn FrameSink>) -> ClientId {
        let client_id = Uuid::new_v4();
        let entry = ClientEntry {
            peer_addr,
            sink: Arc::new(Mutex::new(sink)),
            departed: Arc::new(Notify::new()),
        };
        let mut clients = self.clients.write().await;
        clients.insert(client_id, entry);
        debug!(%client_id, %peer_addr, total = clients.len(), "client registered");
        client_id
    }

    /// Removes a client and hands back its sink so the caller can close it.
    ///
    /// Returns `None` if the client was already removed (for example evicted
    /// by a failed broadcast).
    pub async fn remove(&self, client_id: ClientId) -> Option<SharedSink> {
        let mut clients = self.clients.write().await;
        let entry = clients.remove(&client_id)?;
        entry.departed.notify_one();
        debug!(%client_id, peer_addr = %entry.peer_addr, total = clients.len(), "client removed");
        Some(entry.sink)
    }

    /// Signal fired once the client leaves the registry, whether removed or
    /// evicted.  `None` if it has already left.
    ///
    /// The signal stores a permit, so a departure that happens before the
    /// caller starts waiting is not lost.
    pub async fn departure(&self, client_id: ClientId) -> Option<Arc<Notify>> {
        self.clients
            .read()
            .await
            .get(&client_id)
            .map(|entry| Arc::clone(&entry.departed))
    }

    pub async fn contains(&self, client_id: ClientId) -> bool {
        self.clients.read().await.contains_key(&client_id)
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    /// Identities of all current members, in no particular order.
    pub async fn client_ids(&self) -> Vec<ClientId> {
        self.clients.read().await.keys().copied().collect()
    }

    /// Sends `text` once to every current member and evicts failures.
    ///
    /// Sends run concurrently.  A failure for one client never prevents
    /// delivery to the others.
    pub async fn broadcast(&self, text: String) -> BroadcastReport {
        let targets: Vec<(ClientId, SharedSink)> = {
            let clients = self.clients.read().await;
            clients
                .iter()
                .map(|(id, entry)| (*id, Arc::clone(&entry.sink)))
                .collect()
        };

        let sends = targets.into_iter().map(|(client_id, sink)| {
            let text = text.clone();
            async move {
                let result = sink.lock().await.send_text(text).await;
                (client_id, result)
            }
        });

        let mut report = BroadcastReport::default();
        for (client_id, result) in join_all(sends).await {
            match result {
                Ok(()) => report.delivered.push(client_id),
                Err(e) => {
                    debug!(%client_id, "send failed, evicting: {e}");
                    report.evicted.push(client_id);
                }
            }
        }

        if !report.evicted.is_empty() {
            let mut clients = self.clients.write().await;
            for client_id in &report.evicted {
                if let Some(entry) = clients.remove(client_id) {
                    entry.departed.notify_one();
                }
            }
        }

        report
    }
}

// ── Test doubles ──────────────────────────────────────────────────────────────


// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::testing::{peer, RecordingSink};
    use super::*;

    #[tokio::test]
    async fn test_insert_then_contains() {
        // Arrange
        let registry = ClientRegistry::new();
        let (sink, _) = RecordingSink::new();

        // Act
        let id = registry.insert(peer(), Box::new(sink)).await;

        // Assert
        assert!(registry.contains(id).await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_insert_assigns_distinct_ids() {
        let registry = ClientRegistry::new();
        let a = registry.insert(peer(), Box::new(RecordingSink::new().0)).await;
        let b = registry.insert(peer(), Box::new(RecordingSink::new().0)).await;

        assert_ne!(a, b);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_remove_returns_sink_once() {
        let registry = ClientRegistry::new();
        let id = registry.insert(peer(), Box::new(RecordingSink::new().0)).await;

        assert!(registry.remove(id).await.is_some());
        assert!(registry.remove(id).await.is_none(), "second remove is a no-op");
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_hands_back_sink_for_closing() {
        let registry = ClientRegistry::new();
        let (sink, _) = RecordingSink::new();
        let closed = Arc::clone(&sink.closed);
        let id = registry.insert(peer(), Box::new(sink)).await;

        let shared = registry.remove(id).await.expect("present");
        shared.lock().await.close().await;

        assert!(closed.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_broadcast_delivers_exactly_once_to_each_member() {
        // Arrange: three clients
        let registry = ClientRegistry::new();
        let mut outboxes = Vec::new();
        for _ in 0..3 {
            let (sink, outbox) = RecordingSink::new();
            registry.insert(peer(), Box::new(sink)).await;
            outboxes.push(outbox);
        }

        // Act
        let report = registry.broadcast("frame-1".to_string()).await;

        // Assert
        assert_eq!(report.delivered.len(), 3);
        assert!(report.evicted.is_empty());
        for outbox in outboxes {
            assert_eq!(*outbox.lock().unwrap(), vec!["frame-1".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_broadcast_skips_clients_removed_beforehand() {
        let registry = ClientRegistry::new();
        let (gone_sink, gone_outbox) = RecordingSink::new();
        let (kept_sink, kept_outbox) = RecordingSink::new();
        let gone = registry.insert(peer(), Box::new(gone_sink)).await;
        registry.insert(peer(), Box::new(kept_sink)).await;

        registry.remove(gone).await;
        let report = registry.broadcast("frame".to_string()).await;

        assert_eq!(report.attempted(), 1);
        assert!(gone_outbox.lock().unwrap().is_empty());
        assert_eq!(kept_outbox.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_evicts_failed_client_and_still_delivers_to_others() {
        // Arrange
        let registry = ClientRegistry::new();
        let (bad_sink, _) = RecordingSink::failing(SendError::ConnectionClosed);
        let (good_sink, good_outbox) = RecordingSink::new();
        let bad = registry.insert(peer(), Box::new(bad_sink)).await;
        let good = registry.insert(peer(), Box::new(good_sink)).await;

        // Act
        let report = registry.broadcast("frame".to_string()).await;

        // Assert
        assert_eq!(report.evicted, vec![bad]);
        assert_eq!(report.delivered, vec![good]);
        assert!(!registry.contains(bad).await);
        assert!(registry.contains(good).await);
        assert_eq!(good_outbox.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_transport_error_is_treated_like_closure() {
        let registry = ClientRegistry::new();
        let (sink, _) = RecordingSink::failing(SendError::Transport("reset".to_string()));
        let id = registry.insert(peer(), Box::new(sink)).await;

        let report = registry.broadcast("frame".to_string()).await;

        assert_eq!(report.evicted, vec![id]);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_eviction_fires_departure_signal() {
        // Arrange
        let registry = ClientRegistry::new();
        let (sink, _) = RecordingSink::failing(SendError::Transport("reset".to_string()));
        let id = registry.insert(peer(), Box::new(sink)).await;
        let departed = registry.departure(id).await.expect("registered");

        // Act
        registry.broadcast("frame".to_string()).await;

        // Assert: the stored permit completes the wait immediately
        tokio::time::timeout(std::time::Duration::from_secs(1), departed.notified())
            .await
            .expect("departure was not signalled");
        assert!(registry.departure(id).await.is_none());
    }

    #[tokio::test]
    async fn test_remove_fires_departure_signal() {
        let registry = ClientRegistry::new();
        let id = registry.insert(peer(), Box::new(RecordingSink::new().0)).await;
        let departed = registry.departure(id).await.expect("registered");

        registry.remove(id).await;

        tokio::time::timeout(std::time::Duration::from_secs(1), departed.notified())
            .await
            .expect("departure was not signalled");
    }

    #[tokio::test]
    async fn test_broadcast_on_empty_registry_is_noop() {
        let registry = ClientRegistry::new();
        let report = registry.broadcast("frame".to_string()).await;
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_client_ids_lists_all_members() {
        let registry = ClientRegistry::new();
        let a = registry.insert(peer(), Box::new(RecordingSink::new().0)).await;
        let b = registry.insert(peer(), Box::new(RecordingSink::new().0)).await;

        let mut ids = registry.client_ids().await;
        ids.sort();
        let mut expected = vec![a, b];
        expected.sort();

        assert_eq!(ids, expected);
    }
}
