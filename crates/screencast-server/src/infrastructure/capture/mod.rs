//! Display capture backends.
//!
//! Implements [`screencast_core::FrameSource`] for the real desktop and for
//! tests.
//!
//! | Type                   | Backend                                       |
//! |------------------------|-----------------------------------------------|
//! | [`DisplayFrameSource`] | `xcap` (X11/Wayland on Linux, DXGI/GDI on Windows, CoreGraphics on macOS) |
//! | [`MockFrameSource`]    | Synthetic bitmaps, no OS calls                |
//!
//! [`MockFrameSource`] is always compiled (not guarded by `#[cfg(test)]`) so
//! integration tests and headless CI runs can use it without a display.

pub mod display;
pub mod mock;

pub use display::{describe_monitors, DisplayFrameSource, MonitorSummary};
pub use mock::MockFrameSource;
