//! Mock frame source for tests and headless runs.
//!
//! Produces a solid-colour bitmap of fixed size and encodes it with the real
//! JPEG codec, so viewers receive genuine, decodable frames.  The colour
//! changes with every capture, which lets tests tell cycles apart.

use std::sync::atomic::{AtomicUsize, Ordering};

use image::{Rgba, RgbaImage};
use screencast_core::{
    encode_jpeg, CaptureError, EncodedFrame, FrameError, FrameSource, DEFAULT_IMAGE_QUALITY,
};

/// A [`FrameSource`] that never touches the OS.
pub struct MockFrameSource {
    width: u32,
    height: u32,
    quality: u8,
    captures: AtomicUsize,
    failures_remaining: AtomicUsize,
}

impl MockFrameSource {
    /// A source producing `width`×`height` frames at the default quality.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            quality: DEFAULT_IMAGE_QUALITY,
            captures: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(0),
        }
    }

    /// Makes the first `n` captures fail with [`CaptureError::Platform`].
    pub fn failing_first(self, n: usize) -> Self {
        self.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Number of `capture_frame` calls so far, including failed ones.
    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

impl FrameSource for MockFrameSource {
    fn capture_frame(&self) -> Result<EncodedFrame, FrameError> {
        let n = self.captures.fetch_add(1, Ordering::SeqCst);

        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(CaptureError::Platform(format!("injected failure #{}", n + 1)).into());
        }

        let shade = ((n * 47) % 256) as u8;
        let image = RgbaImage::from_pixel(
            self.width,
            self.height,
            Rgba([shade, 255 - shade, 128, 255]),
        );
        let jpeg = encode_jpeg(image, self.quality)?;
        Ok(EncodedFrame {
            width: self.width,
            height: self.height,
            jpeg,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
