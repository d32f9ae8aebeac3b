//! Real display capture via `xcap`.
//!
//! Each call enumerates the monitors afresh, so hot-plugging a display
//! between cycles is picked up on the next frame.  Monitor handles are never
//! held across calls; some platforms tie them to the thread that created
//! them, and captures run on whichever blocking-pool thread is free.

use image::RgbaImage;
use screencast_core::{encode_jpeg, CaptureError, EncodedFrame, FrameError, FrameSource};
use tracing::{debug, trace};
use xcap::Monitor;

/// A monitor as reported by the platform, for `--list-monitors` and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSummary {
    pub index: usize,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub is_primary: bool,
}

/// Captures one monitor and JPEG-encodes it at a fixed quality.
#[derive(Debug, Clone)]
pub struct DisplayFrameSource {
    monitor_index: Option<usize>,
    quality: u8,
}

impl DisplayFrameSource {
    /// `monitor_index = None` selects the primary monitor.
    pub fn new(monitor_index: Option<usize>, quality: u8) -> Self {
        Self {
            monitor_index,
            quality,
        }
    }
}

impl FrameSource for DisplayFrameSource {
    fn capture_frame(&self) -> Result<EncodedFrame, FrameError> {
        let image = capture_display(self.monitor_index)?;
        let (width, height) = image.dimensions();
        let jpeg = encode_jpeg(image, self.quality)?;
        trace!(width, height, jpeg_bytes = jpeg.len(), "display frame encoded");
        Ok(EncodedFrame {
            width,
            height,
            jpeg,
        })
    }
}

/// Grabs the selected monitor as a raw RGBA bitmap.
///
/// # Errors
///
/// [`CaptureError::NoDisplay`] when no monitors are reported,
/// [`CaptureError::MonitorNotFound`] for an out-of-range index, and
/// [`CaptureError::Platform`] for any `xcap` failure.
pub fn capture_display(monitor_index: Option<usize>) -> Result<RgbaImage, CaptureError> {
    let monitors = Monitor::all().map_err(platform)?;
    let primary_flags: Vec<bool> = monitors
        .iter()
        .map(|m| m.is_primary().unwrap_or(false))
        .collect();
    let index = select_monitor(&primary_flags, monitor_index)?;

    debug!(index, "capturing monitor");
    monitors[index].capture_image().map_err(platform)
}

/// Lists the monitors currently attached, in enumeration order.
///
/// # Errors
///
/// Returns [`CaptureError::Platform`] if enumeration fails.
pub fn describe_monitors() -> Result<Vec<MonitorSummary>, CaptureError> {
    let monitors = Monitor::all().map_err(platform)?;
    monitors
        .iter()
        .enumerate()
        .map(|(index, m)| {
            Ok(MonitorSummary {
                index,
                name: m.name().map_err(platform)?,
                width: m.width().map_err(platform)?,
                height: m.height().map_err(platform)?,
                is_primary: m.is_primary().unwrap_or(false),
            })
        })
        .collect()
}

/// Picks a monitor index from the enumeration.
///
/// `requested = None` chooses the first monitor flagged primary, falling back
/// to index 0 when the platform flags none.
fn select_monitor(primary_flags: &[bool], requested: Option<usize>) -> Result<usize, CaptureError> {
    if primary_flags.is_empty() {
        return Err(CaptureError::NoDisplay);
    }
    match requested {
        Some(index) if index < primary_flags.len() => Ok(index),
        Some(index) => Err(CaptureError::MonitorNotFound {
            index,
            available: primary_flags.len(),
        }),
        None => Ok(primary_flags.iter().position(|p| *p).unwrap_or(0)),
    }
}

fn platform(e: impl std::fmt::Display) -> CaptureError {
    CaptureError::Platform(e.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
