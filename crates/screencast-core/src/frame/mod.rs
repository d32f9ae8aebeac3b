//! Captured frames and the Capture-and-Encode contract.
//!
//! A frame is ephemeral: produced by a [`FrameSource`], wrapped in a text
//! envelope, sent to every viewer, and dropped.  Nothing here is persisted.
//!
//! # Error taxonomy
//!
//! | Error           | Raised when                                        |
//! |-----------------|----------------------------------------------------|
//! | [`CaptureError`] | the display surface cannot be read               |
//! | [`EncodeError`]  | the raw bitmap cannot be compressed              |
//!
//! Both are wrapped by [`FrameError`].  The broadcast loop treats every
//! `FrameError` as non-fatal: the cycle is skipped and the next one runs on
//! schedule.

use thiserror::Error;

/// Failure to read the display surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// The platform reported no monitors at all (headless session, no
    /// `DISPLAY`, compositor refused access).
    #[error("no display surface available")]
    NoDisplay,

    /// The configured monitor index is outside the enumerated range.
    #[error("monitor index {index} out of range ({available} monitor(s) available)")]
    MonitorNotFound { index: usize, available: usize },

    /// The platform capture API failed (permission denied, driver error).
    #[error("platform capture failed: {0}")]
    Platform(String),

    /// The blocking worker running the capture panicked or was cancelled.
    #[error("capture worker failed: {0}")]
    Worker(String),
}

/// Failure to compress a captured bitmap.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// The bitmap has a zero dimension or exceeds what JPEG can represent.
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The JPEG encoder itself failed.
    #[error("JPEG encoding failed: {0}")]
    Codec(String),
}

/// Any failure of the Capture-and-Encode step.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// One compressed snapshot of a display surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Width of the captured surface in pixels.
    pub width: u32,
    /// Height of the captured surface in pixels.
    pub height: u32,
    /// JPEG-compressed image bytes.
    pub jpeg: Vec<u8>,
}

impl EncodedFrame {
    /// Size of the compressed payload in bytes.
    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    /// Returns `true` if the compressed payload is empty.
    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }
}

/// Produces one compressed frame on demand.
///
/// Implementations keep no state between calls that affects the output other
/// than what the display currently shows.  `capture_frame` may block for the
/// duration of a screen grab plus a JPEG encode, so async callers should run
/// it on a blocking thread (`tokio::task::spawn_blocking`).
pub trait FrameSource: Send + Sync {
    /// Captures the configured display and returns it JPEG-encoded.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Capture`] if the display cannot be read and
    /// [`FrameError::Encode`] if compression fails.
    fn capture_frame(&self) -> Result<EncodedFrame, FrameError>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
