//! Protocol module containing the frame container and handshake constants.

pub mod messages;

pub use messages::*;
