//! Image codecs used to compress captured frames.

pub mod jpeg;

pub use jpeg::{encode_jpeg, DEFAULT_IMAGE_QUALITY};
