//! Lossy JPEG compression of captured bitmaps.
//!
//! Screen captures arrive as 8-bit RGBA buffers.  JPEG has no alpha channel,
//! so the buffer is flattened to RGB before encoding.  The quality factor is
//! fixed per process (see `image_quality` in the server configuration) and
//! favours bandwidth over fidelity: the default of 50 keeps a 1080p desktop
//! well under a few hundred kilobytes.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use tracing::trace;

use crate::frame::EncodeError;

/// Quality factor used when none is configured (0–100 scale).
pub const DEFAULT_IMAGE_QUALITY: u8 = 50;

/// Largest width or height a baseline JPEG can describe.
pub const JPEG_MAX_DIMENSION: u32 = u16::MAX as u32;

/// Compresses an RGBA bitmap into JPEG bytes.
///
/// `quality` is on the usual 0–100 scale.  Values above 100 are clamped to
/// 100 and 0 is clamped to 1, the lowest setting the encoder accepts.
///
/// # Errors
///
/// Returns [`EncodeError::InvalidDimensions`] when either dimension is zero
/// or larger than [`JPEG_MAX_DIMENSION`], and [`EncodeError::Codec`] if the
/// encoder reports a failure.
pub fn encode_jpeg(image: RgbaImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || width > JPEG_MAX_DIMENSION || height > JPEG_MAX_DIMENSION {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let rgb = DynamicImage::ImageRgba8(image).into_rgb8();
    let quality = quality.clamp(1, 100);

    // Raw RGB is 3 bytes per pixel; a mid-quality JPEG of desktop content is
    // typically an order of magnitude smaller.
    let mut out = Vec::with_capacity((width as usize * height as usize * 3) / 10);
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .map_err(|e| EncodeError::Codec(e.to_string()))?;

    trace!(width, height, quality, bytes = out.len(), "encoded JPEG frame");
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
