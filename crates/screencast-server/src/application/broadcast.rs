//! One broadcast cycle: capture once, wrap once, send to everyone.
//!
//! The single frame captured in a cycle is sent byte-identically to every
//! registry member, which keeps viewers loosely in sync to within one cycle.
//! A capture or encode failure skips the cycle entirely so that no partial or
//! malformed message ever reaches a viewer.

use std::sync::Arc;

use screencast_core::{
    encode_image_envelope, CaptureError, EncodedFrame, FrameError, FrameSource, ProtocolError,
};
use thiserror::Error;
use tracing::{debug, warn};

use super::registry::{BroadcastReport, ClientRegistry};

/// Why a cycle was skipped.
#[derive(Debug, Error)]
pub enum CycleFault {
    #[error("frame unavailable: {0}")]
    Frame(#[from] FrameError),

    #[error("envelope could not be built: {0}")]
    Envelope(#[from] ProtocolError),
}

/// What one cycle did.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A frame was fanned out; see the report for per-client results.
    Broadcast(BroadcastReport),
    /// Nothing was sent this cycle.
    Skipped(CycleFault),
}

impl CycleOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, CycleOutcome::Skipped(_))
    }
}

/// Runs broadcast cycles against a shared registry and frame source.
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
    source: Arc<dyn FrameSource>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ClientRegistry>, source: Arc<dyn FrameSource>) -> Self {
        Self { registry, source }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Runs the frame source on the blocking pool.
    ///
    /// # Errors
    ///
    /// Propagates the source's [`FrameError`]; a panicked worker is reported
    /// as [`CaptureError::Worker`].
    pub async fn capture(&self) -> Result<EncodedFrame, FrameError> {
        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || source.capture_frame())
            .await
            .map_err(|e| FrameError::Capture(CaptureError::Worker(e.to_string())))?
    }

    /// Captures one frame and sends it to every registered client.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let frame = match self.capture().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!("broadcast cycle skipped: {e}");
                return CycleOutcome::Skipped(e.into());
            }
        };

        let text = match encode_image_envelope(&frame.jpeg) {
            Ok(text) => text,
            Err(e) => {
                warn!("broadcast cycle skipped: {e}");
                return CycleOutcome::Skipped(e.into());
            }
        };

        let report = self.registry.broadcast(text).await;
        debug!(
            width = frame.width,
            height = frame.height,
            jpeg_bytes = frame.len(),
            delivered = report.delivered.len(),
            evicted = report.evicted.len(),
            "broadcast cycle complete"
        );
        CycleOutcome::Broadcast(report)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
