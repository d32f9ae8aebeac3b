//! Protocol module containing the JSON messages exchanged with viewers.

pub mod messages;

pub use messages::*;
