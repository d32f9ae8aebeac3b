//! JSON message types for the viewer-facing WebSocket protocol.
//!
//! Every message is a single JSON object carried in one WebSocket text frame.
//! A `"type"` field identifies the variant; the remaining fields sit in the
//! same object.  Serde's `#[serde(tag = "type")]` handles the discriminant.
//!
//! # Message flow
//!
//! ```text
//! Server → Viewer:  ServerMessage   {"type":"image","data":"<base64 JPEG>"}
//! Viewer → Server:  ClientMessage   {"type":"request_next_frame"} (and friends)
//! ```
//!
//! The channel is effectively one-way.  The server never replies to a
//! [`ClientMessage`]; it parses them only so that they can be logged.
//!
//! # Why base64?
//!
//! JSON strings must be valid Unicode text, and JPEG bytes are not.  Standard
//! base64 (RFC 4648, `A-Za-z0-9+/` with `=` padding) maps every 3 raw bytes to
//! 4 printable characters, and browsers decode it natively via a
//! `data:image/jpeg;base64,...` URL.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building or reading an envelope.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The envelope could not be serialized or parsed as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The `data` field is not valid standard base64.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

// ── Server → Viewer ───────────────────────────────────────────────────────────

/// All messages the server pushes to viewers.
///
/// This version defines a single variant.
///
/// ```json
/// {"type":"image","data":"/9j/4AAQSkZJRg..."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// One JPEG frame, base64-encoded.
    Image {
        /// Standard base64 of the compressed image bytes.
        data: String,
    },
}

impl ServerMessage {
    /// Wraps compressed image bytes in an `image` message.
    pub fn image(jpeg: &[u8]) -> Self {
        ServerMessage::Image {
            data: STANDARD.encode(jpeg),
        }
    }
}

/// Builds the JSON text frame for one compressed image.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if serialization fails.
///
/// # Example
///
/// ```rust
/// use screencast_core::encode_image_envelope;
///
/// let text = encode_image_envelope(&[0xFF, 0xD8, 0xFF]).unwrap();
/// assert_eq!(text, r#"{"type":"image","data":"/9j/"}"#);
/// ```
pub fn encode_image_envelope(jpeg: &[u8]) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(&ServerMessage::image(jpeg))?)
}

/// Parses an `image` text frame and returns the decoded image bytes.
///
/// This is the viewer-side inverse of [`encode_image_envelope`].
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] if the text is not a valid `image`
/// envelope (including an unknown `type`), and [`ProtocolError::Base64`] if
/// `data` is not valid base64.
pub fn decode_image_envelope(text: &str) -> Result<Vec<u8>, ProtocolError> {
    let message: ServerMessage = serde_json::from_str(text)?;
    let ServerMessage::Image { data } = message;
    Ok(STANDARD.decode(data)?)
}

// ── Viewer → Server ───────────────────────────────────────────────────────────

/// Messages a viewer may send over the same connection.
///
/// The reference web viewer emits these; the server logs them and otherwise
/// ignores them.
///
/// ```json
/// {"type":"request_next_frame"}
/// {"type":"message","data":"hola"}
/// {"type":"file","fileName":"notes.txt","fileData":"aGVsbG8="}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Viewer asks for a fresh frame (sent on every animation frame).
    RequestNextFrame,

    /// Free-text chat line.
    Message {
        /// Message text.
        data: String,
    },

    /// A file offered by the viewer.
    File {
        /// Original file name.
        #[serde(rename = "fileName")]
        file_name: String,
        /// File content as standard base64.
        #[serde(rename = "fileData")]
        file_data: String,
    },
}

impl ClientMessage {
    /// Short variant name for log lines that must not echo user content.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::RequestNextFrame => "request_next_frame",
            ClientMessage::Message { .. } => "message",
            ClientMessage::File { .. } => "file",
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
