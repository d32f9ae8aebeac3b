//! WebSocket server: accept loop and per-connection tasks.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured host and port.
//! 2. Accepting connections and upgrading each to a WebSocket session.
//! 3. Registering the session's outbound half with the [`ClientRegistry`].
//! 4. Running the broadcast cycle loop ([`run_broadcast_cycles`]) for the
//!    session, with an inbound reader that notices the viewer closing the
//!    connection.  The reader is consulted between cycles only, so a viewer
//!    hanging up never interrupts a fan-out to the others.
//! 5. Removing the client and closing its socket when the session ends.
//! 6. Stopping the accept loop when the `running` flag is cleared.
//!
//! Every session task runs its own cycle loop, and each cycle sends to every
//! registered viewer, so with N viewers connected each viewer receives N
//! frames per interval.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{error::ProtocolError as WsProtocolError, Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};

use screencast_core::{ClientMessage, FrameSource};

use crate::application::{
    run_broadcast_cycles, Broadcaster, ClientRegistry, FrameSink, IntervalTicker, SendError,
    SessionEnd,
};
use crate::domain::{ClientId, ConnectionLifecycle, ServerConfig};

/// How often the accept loop wakes to check the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Public API ────────────────────────────────────────────────────────────────

/// A bound, not yet running, broadcast server.
pub struct ScreencastServer {
    listener: TcpListener,
    broadcaster: Arc<Broadcaster>,
    interval: Duration,
}

impl ScreencastServer {
    /// Binds the listener for `config` and prepares an empty registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot be resolved or the port cannot be
    /// bound (already in use, insufficient permission).
    pub async fn bind(config: &ServerConfig, source: Arc<dyn FrameSource>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .with_context(|| {
                format!(
                    "failed to bind WebSocket listener on {}",
                    config.listen_label()
                )
            })?;

        let registry = Arc::new(ClientRegistry::new());
        Ok(Self {
            listener,
            broadcaster: Arc::new(Broadcaster::new(registry, source)),
            interval: config.interval,
        })
    }

    /// Address actually bound; differs from the configured one when port 0
    /// was requested.
    ///
    /// # Errors
    ///
    /// Propagates the OS error from `getsockname`.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to read listener address")
    }

    /// The registry shared by every session of this server.
    pub fn registry(&self) -> Arc<ClientRegistry> {
        Arc::clone(self.broadcaster.registry())
    }

    /// Accepts viewers until `running` is cleared, then closes every
    /// remaining connection.
    ///
    /// # Errors
    ///
    /// Only the setup steps can fail; per-connection errors are logged and
    /// never end the accept loop.
    pub async fn run(self, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        info!("screencast server listening on {}", self.local_addr()?);

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            match timeout(ACCEPT_POLL, self.listener.accept()).await {
                Ok(Ok((stream, peer_addr))) => {
                    debug!("new connection from {peer_addr}");
                    let broadcaster = Arc::clone(&self.broadcaster);
                    let running = Arc::clone(&running);
                    let interval = self.interval;
                    tokio::spawn(async move {
                        handle_connection(stream, peer_addr, broadcaster, interval, running).await;
                    });
                }
                Ok(Err(e)) => {
                    // Transient (e.g. EMFILE); keep serving.
                    error!("accept error: {e}");
                }
                Err(_) => {}
            }
        }

        close_all(self.broadcaster.registry()).await;
        Ok(())
    }
}

// ── Per-connection handler ────────────────────────────────────────────────────

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    broadcaster: Arc<Broadcaster>,
    interval: Duration,
    running: Arc<AtomicBool>,
) {
    match run_session(stream, peer_addr, &broadcaster, interval, running).await {
        Ok(end) => info!("viewer {peer_addr} disconnected: {end:?}"),
        Err(e) => warn!("viewer {peer_addr} failed: {e:#}"),
    }
}

/// Runs one viewer from handshake to removal.
///
/// # Errors
///
/// Returns an error only if the WebSocket handshake fails; the client is
/// never registered in that case.
async fn run_session(
    stream: TcpStream,
    peer_addr: SocketAddr,
    broadcaster: &Broadcaster,
    interval: Duration,
    running: Arc<AtomicBool>,
) -> anyhow::Result<SessionEnd> {
    let ws_stream = accept_async(stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let (ws_tx, ws_rx) = ws_stream.split();
    let registry = Arc::clone(broadcaster.registry());
    let client_id = registry
        .insert(peer_addr, Box::new(WsFrameSink::new(ws_tx)))
        .await;
    info!(%client_id, "viewer {peer_addr} connected ({} total)", registry.len().await);

    let mut lifecycle = ConnectionLifecycle::new(client_id);
    let mut ticker = IntervalTicker::new(interval, running);

    let end = run_broadcast_cycles(
        client_id,
        broadcaster,
        &mut ticker,
        &mut lifecycle,
        watch_inbound(client_id, ws_rx),
    )
    .await;

    if let Some(sink) = registry.remove(client_id).await {
        sink.lock().await.close().await;
    }
    lifecycle.disconnect();
    info!(%client_id, "{} viewers remain", registry.len().await);
    Ok(end)
}

/// Reads the viewer's half of the connection until it closes.
///
/// Viewer messages carry no meaning for the server; they are parsed only to
/// log what the viewer asked for.
async fn watch_inbound<S>(client_id: ClientId, mut inbound: S) -> SessionEnd
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    while let Some(frame) = inbound.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => debug!(%client_id, kind = msg.kind(), "viewer message ignored"),
                Err(e) => warn!(%client_id, "unrecognised viewer message: {e}"),
            },
            Ok(WsMessage::Close(_)) => return SessionEnd::ClientClosed,
            Ok(_) => {}
            Err(e) => {
                return match classify_ws_error(&e) {
                    SendError::ConnectionClosed => SessionEnd::ClientClosed,
                    SendError::Transport(reason) => SessionEnd::TransportFailed(reason),
                }
            }
        }
    }
    SessionEnd::ClientClosed
}

async fn close_all(registry: &ClientRegistry) {
    let ids = registry.client_ids().await;
    if !ids.is_empty() {
        info!("closing {} viewer connection(s)", ids.len());
    }
    for id in ids {
        if let Some(sink) = registry.remove(id).await {
            sink.lock().await.close().await;
        }
    }
}

// ── WebSocket sink ────────────────────────────────────────────────────────────

/// [`FrameSink`] over the write half of a WebSocket.
pub struct WsFrameSink<S> {
    tx: S,
}

impl<S> WsFrameSink<S> {
    pub fn new(tx: S) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl<S> FrameSink for WsFrameSink<S>
where
    S: Sink<WsMessage, Error = WsError> + Unpin + Send,
{
    async fn send_text(&mut self, text: String) -> Result<(), SendError> {
        self.tx
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| classify_ws_error(&e))
    }

    async fn close(&mut self) {
        if let Err(e) = self.tx.close().await {
            debug!("close on already-broken socket: {e}");
        }
    }
}

/// Maps a tungstenite error onto the two outcomes the registry cares about.
fn classify_ws_error(e: &WsError) -> SendError {
    use std::io::ErrorKind;

    match e {
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(WsProtocolError::SendAfterClosing)
        | WsError::Protocol(WsProtocolError::ResetWithoutClosingHandshake) => {
            SendError::ConnectionClosed
        }
        WsError::Io(io)
            if matches!(
                io.kind(),
                ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
            ) =>
        {
            SendError::ConnectionClosed
        }
        other => SendError::Transport(other.to_string()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
