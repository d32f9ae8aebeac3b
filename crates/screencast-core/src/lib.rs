//! # screencast-core
//!
//! Shared library for Screencast containing the frame capture contract, the
//! JPEG codec, and the JSON envelope that carries frames to viewers.
//!
//! It has zero dependencies on OS capture APIs, async runtimes, or network
//! sockets.  The server crate plugs a real display into [`FrameSource`] and
//! owns all I/O.
//!
//! # Architecture overview
//!
//! Screencast periodically grabs the primary display and pushes the encoded
//! image to every connected WebSocket viewer.  This crate defines:
//!
//! - **`frame`** – What a captured frame is, the [`FrameSource`] trait that
//!   produces one on demand, and the capture/encode error taxonomy.
//!
//! - **`codec`** – Turns a raw RGBA bitmap into a compressed JPEG buffer at a
//!   fixed quality factor.
//!
//! - **`protocol`** – The `{"type":"image","data":"<base64>"}` text envelope
//!   sent to viewers, plus the messages a viewer may send back.

pub mod codec;
pub mod frame;
pub mod protocol;

pub use codec::jpeg::{encode_jpeg, DEFAULT_IMAGE_QUALITY};
pub use frame::{CaptureError, EncodeError, EncodedFrame, FrameError, FrameSource};
pub use protocol::messages::{
    decode_image_envelope, encode_image_envelope, ClientMessage, ProtocolError, ServerMessage,
};
