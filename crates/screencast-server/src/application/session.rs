//! The per-connection supervising loop.
//!
//! Each connected client runs this loop on its own task:
//!
//! ```text
//! while registered:
//!     Connected → Sending
//!     run one broadcast cycle (capture once, send to every client)
//!     Sending → Connected
//!     wait for the ticker, the viewer leaving, or eviction
//! ```
//!
//! A cycle, once started, always runs to completion: the viewer leaving is
//! only observed while waiting between cycles, so a fan-out already in
//! flight to other clients is never cut short.
//!
//! The loop never removes its own client; the caller does that once the loop
//! returns.  A client evicted by any cycle, including one run by a different
//! connection, wakes its loop through the registry's departure signal.

use std::future::Future;

use tracing::{debug, warn};

use crate::domain::{ClientId, ConnectionLifecycle};

use super::broadcast::Broadcaster;
use super::ticker::Ticker;

/// Why a connection's session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// A send to this client failed and the registry evicted it.
    Evicted,
    /// The viewer closed the connection.
    ClientClosed,
    /// Reading from the viewer failed.
    TransportFailed(String),
    /// The ticker was cancelled (server shutdown).
    Cancelled,
    /// The lifecycle rejected a transition.
    InvalidState(String),
}

/// Runs broadcast cycles on behalf of `client_id` until it leaves the
/// registry, the ticker is cancelled, or `closed` resolves.
///
/// `closed` resolves when the viewer goes away (typically the inbound reader
/// of the connection).  It is polled only between cycles.
///
/// The first cycle runs immediately, so a new viewer gets a frame without
/// waiting a full interval.
pub async fn run_broadcast_cycles<T, C>(
    client_id: ClientId,
    broadcaster: &Broadcaster,
    ticker: &mut T,
    lifecycle: &mut ConnectionLifecycle,
    closed: C,
) -> SessionEnd
where
    T: Ticker + ?Sized,
    C: Future<Output = SessionEnd>,
{
    let registry = broadcaster.registry();
    let Some(departed) = registry.departure(client_id).await else {
        return SessionEnd::Evicted;
    };
    tokio::pin!(closed);

    loop {
        if !registry.contains(client_id).await {
            return SessionEnd::Evicted;
        }

        if let Err(e) = lifecycle.begin_send() {
            warn!("{e}");
            return SessionEnd::InvalidState(e.to_string());
        }
        let outcome = broadcaster.run_cycle().await;
        if let Err(e) = lifecycle.finish_send() {
            warn!("{e}");
            return SessionEnd::InvalidState(e.to_string());
        }
        debug!(%client_id, skipped = outcome.is_skipped(), "cycle finished");

        if !registry.contains(client_id).await {
            return SessionEnd::Evicted;
        }

        tokio::select! {
            biased;
            end = &mut closed => return end,
            _ = departed.notified() => return SessionEnd::Evicted,
            more = ticker.tick() => {
                if !more {
                    return SessionEnd::Cancelled;
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::{pending, Pending};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use screencast_core::{CaptureError, EncodedFrame, FrameError, FrameSource};

    use crate::application::registry::testing::{peer, RecordingSink};
    use crate::application::{ClientRegistry, FrameSink, ManualTicker, SendError};
    use crate::domain::ConnectionState;

    /// Counts captures; fails when `fail` is set.
    #[derive(Default)]
    struct CountingSource {
        captures: AtomicUsize,
        fail: bool,
    }

    impl FrameSource for CountingSource {
        fn capture_frame(&self) -> Result<EncodedFrame, FrameError> {
            let n = self.captures.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CaptureError::NoDisplay.into());
            }
            Ok(EncodedFrame {
                width: 1,
                height: 1,
                jpeg: vec![n as u8],
            })
        }
    }

    /// A viewer that never leaves on its own.
    fn stays_open() -> Pending<SessionEnd> {
        pending()
    }

    /// Accepts the first message, then fails like a reset socket.
    struct FailsAfterFirstSink {
        outbox: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl FrameSink for FailsAfterFirstSink {
        async fn send_text(&mut self, text: String) -> Result<(), SendError> {
            let mut outbox = self.outbox.lock().unwrap();
            if outbox.is_empty() {
                outbox.push(text);
                Ok(())
            } else {
                Err(SendError::Transport("connection reset".to_string()))
            }
        }

        async fn close(&mut self) {}
    }

    async fn wait_for_messages(outbox: &std::sync::Mutex<Vec<String>>, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while outbox.lock().unwrap().len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("messages did not arrive in time");
    }

    #[tokio::test]
    async fn test_first_cycle_runs_without_waiting_for_ticker() {
        // Arrange
        let registry = Arc::new(ClientRegistry::new());
        let (sink, outbox) = RecordingSink::new();
        let id = registry.insert(peer(), Box::new(sink)).await;
        let broadcaster = Broadcaster::new(registry, Arc::new(CountingSource::default()));
        let (mut ticker, trigger) = ManualTicker::new();
        let mut lifecycle = ConnectionLifecycle::new(id);

        // Act: cancel before any tick so only the initial cycle runs
        drop(trigger);
        let end =
            run_broadcast_cycles(id, &broadcaster, &mut ticker, &mut lifecycle, stays_open())
                .await;

        // Assert
        assert_eq!(end, SessionEnd::Cancelled);
        assert_eq!(outbox.lock().unwrap().len(), 1);
        assert_eq!(lifecycle.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_each_tick_runs_exactly_one_more_cycle() {
        let registry = Arc::new(ClientRegistry::new());
        let (sink, outbox) = RecordingSink::new();
        let id = registry.insert(peer(), Box::new(sink)).await;
        let source = Arc::new(CountingSource::default());
        let broadcaster = Broadcaster::new(registry, Arc::clone(&source) as Arc<dyn FrameSource>);
        let (mut ticker, trigger) = ManualTicker::new();

        let handle = tokio::spawn(async move {
            let mut lifecycle = ConnectionLifecycle::new(id);
            run_broadcast_cycles(id, &broadcaster, &mut ticker, &mut lifecycle, stays_open())
                .await
        });

        wait_for_messages(&outbox, 1).await;
        trigger.fire();
        wait_for_messages(&outbox, 2).await;
        trigger.fire();
        wait_for_messages(&outbox, 3).await;
        drop(trigger);

        let end = handle.await.expect("join");
        assert_eq!(end, SessionEnd::Cancelled);
        assert_eq!(outbox.lock().unwrap().len(), 3);
        assert_eq!(source.captures.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_loop_ends_evicted_when_own_send_fails() {
        let registry = Arc::new(ClientRegistry::new());
        let (sink, _) = RecordingSink::failing(SendError::ConnectionClosed);
        let id = registry.insert(peer(), Box::new(sink)).await;
        let broadcaster = Broadcaster::new(Arc::clone(&registry), Arc::new(CountingSource::default()));
        let (mut ticker, _trigger) = ManualTicker::new();
        let mut lifecycle = ConnectionLifecycle::new(id);

        let end =
            run_broadcast_cycles(id, &broadcaster, &mut ticker, &mut lifecycle, stays_open())
                .await;

        assert_eq!(end, SessionEnd::Evicted);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_loop_ends_evicted_when_removed_before_start() {
        let registry = Arc::new(ClientRegistry::new());
        let (sink, outbox) = RecordingSink::new();
        let id = registry.insert(peer(), Box::new(sink)).await;
        registry.remove(id).await;
        let broadcaster = Broadcaster::new(registry, Arc::new(CountingSource::default()));
        let (mut ticker, _trigger) = ManualTicker::new();
        let mut lifecycle = ConnectionLifecycle::new(id);

        let end =
            run_broadcast_cycles(id, &broadcaster, &mut ticker, &mut lifecycle, stays_open())
                .await;

        assert_eq!(end, SessionEnd::Evicted);
        assert!(outbox.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_capture_failures_keep_loop_alive() {
        // Arrange: every capture fails
        let registry = Arc::new(ClientRegistry::new());
        let (sink, outbox) = RecordingSink::new();
        let id = registry.insert(peer(), Box::new(sink)).await;
        let source = Arc::new(CountingSource {
            captures: AtomicUsize::new(0),
            fail: true,
        });
        let broadcaster =
            Broadcaster::new(Arc::clone(&registry), Arc::clone(&source) as Arc<dyn FrameSource>);
        let (mut ticker, trigger) = ManualTicker::new();
        for _ in 0..3 {
            trigger.fire();
        }
        drop(trigger);
        let mut lifecycle = ConnectionLifecycle::new(id);

        // Act
        let end =
            run_broadcast_cycles(id, &broadcaster, &mut ticker, &mut lifecycle, stays_open())
                .await;

        // Assert: initial cycle + 3 ticks, all skipped, client still present
        assert_eq!(end, SessionEnd::Cancelled);
        assert_eq!(source.captures.load(Ordering::SeqCst), 4);
        assert!(outbox.lock().unwrap().is_empty());
        assert!(registry.contains(id).await);
    }

    #[tokio::test]
    async fn test_disconnected_lifecycle_stops_loop() {
        let registry = Arc::new(ClientRegistry::new());
        let id = registry.insert(peer(), Box::new(RecordingSink::new().0)).await;
        let broadcaster = Broadcaster::new(registry, Arc::new(CountingSource::default()));
        let (mut ticker, _trigger) = ManualTicker::new();
        let mut lifecycle = ConnectionLifecycle::new(id);
        lifecycle.disconnect();

        let end =
            run_broadcast_cycles(id, &broadcaster, &mut ticker, &mut lifecycle, stays_open())
                .await;

        assert!(matches!(end, SessionEnd::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_viewer_leaving_mid_cycle_does_not_cut_off_other_members() {
        // Arrange: the other member's socket takes 300 ms per send
        let registry = Arc::new(ClientRegistry::new());
        let (own_sink, own_outbox) = RecordingSink::new();
        let (slow_sink, slow_outbox) = RecordingSink::slow(Duration::from_millis(300));
        let id = registry.insert(peer(), Box::new(own_sink)).await;
        let other = registry.insert(peer(), Box::new(slow_sink)).await;
        let source = Arc::new(CountingSource::default());
        let broadcaster =
            Broadcaster::new(Arc::clone(&registry), Arc::clone(&source) as Arc<dyn FrameSource>);
        let (mut ticker, _trigger) = ManualTicker::new();
        let mut lifecycle = ConnectionLifecycle::new(id);

        // The viewer hangs up 100 ms into the first cycle.
        let (left_tx, left_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let _ = left_tx.send(());
        });
        let closed = async move {
            let _ = left_rx.await;
            SessionEnd::ClientClosed
        };

        // Act
        let end =
            run_broadcast_cycles(id, &broadcaster, &mut ticker, &mut lifecycle, closed).await;

        // Assert: the in-flight fan-out completed for the slow member
        assert_eq!(end, SessionEnd::ClientClosed);
        assert_eq!(slow_outbox.lock().unwrap().len(), 1);
        assert_eq!(own_outbox.lock().unwrap().len(), 1);
        assert_eq!(source.captures.load(Ordering::SeqCst), 1);
        assert!(registry.contains(other).await);
    }

    #[tokio::test]
    async fn test_viewer_leaving_is_noticed_while_waiting_for_ticker() {
        let registry = Arc::new(ClientRegistry::new());
        let (sink, outbox) = RecordingSink::new();
        let id = registry.insert(peer(), Box::new(sink)).await;
        let broadcaster = Broadcaster::new(registry, Arc::new(CountingSource::default()));
        // Trigger kept alive and never fired: the ticker would wait forever.
        let (mut ticker, _trigger) = ManualTicker::new();
        let mut lifecycle = ConnectionLifecycle::new(id);

        let end = run_broadcast_cycles(
            id,
            &broadcaster,
            &mut ticker,
            &mut lifecycle,
            std::future::ready(SessionEnd::ClientClosed),
        )
        .await;

        assert_eq!(end, SessionEnd::ClientClosed);
        assert_eq!(outbox.lock().unwrap().len(), 1);
        assert_eq!(lifecycle.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_eviction_by_another_cycle_wakes_waiting_loop() {
        // Arrange: a loop parked on a ticker that never fires
        let registry = Arc::new(ClientRegistry::new());
        let outbox = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = FailsAfterFirstSink {
            outbox: Arc::clone(&outbox),
        };
        let id = registry.insert(peer(), Box::new(sink)).await;
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::clone(&registry),
            Arc::new(CountingSource::default()),
        ));
        let (mut ticker, trigger) = ManualTicker::new();

        let loop_broadcaster = Arc::clone(&broadcaster);
        let handle = tokio::spawn(async move {
            let mut lifecycle = ConnectionLifecycle::new(id);
            run_broadcast_cycles(
                id,
                &loop_broadcaster,
                &mut ticker,
                &mut lifecycle,
                stays_open(),
            )
            .await
        });
        wait_for_messages(&outbox, 1).await;

        // Act: a cycle run on behalf of some other connection fails this send
        let outcome = broadcaster.run_cycle().await;

        // Assert: the parked loop ends without waiting for a tick
        let end = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("evicted loop kept waiting")
            .expect("join");
        assert_eq!(end, SessionEnd::Evicted);
        match outcome {
            crate::application::CycleOutcome::Broadcast(report) => {
                assert_eq!(report.evicted, vec![id]);
            }
            other => panic!("expected a broadcast, got {other:?}"),
        }
        drop(trigger);
    }
}
