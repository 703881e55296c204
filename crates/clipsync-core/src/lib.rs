//! # clipsync-core
//!
//! Shared types for ClipSync: the frame container exchanged with the relay
//! server, the device identity presented at connect time, and the
//! connectivity state published to status observers.
//!
//! This crate has no dependencies on sockets, async runtimes, or OS
//! clipboard APIs, so every type here can be unit-tested in isolation and
//! reused by any future front end (tray app, CLI, server-side tooling).
//!
//! # Architecture overview
//!
//! ClipSync keeps every device's clipboard in step through a relay server.
//! Each device runs a client that holds one long-lived WebSocket connection
//! to the relay:
//!
//! - **`protocol`** – What travels over the connection.  A
//!   [`MessageContainer`] pairs a [`MessageKind`] (text, binary, close, ping,
//!   pong) with a raw payload.  The kind codes match the WebSocket opcodes so
//!   the transport layer can map them one-to-one.
//!
//! - **`domain`** – Who we are and how we are doing.  [`EndpointIdentity`]
//!   carries the server URL and the two identity headers sent during the
//!   handshake; [`ConnectivityState`] is the three-valued status shown to the
//!   user.

pub mod domain;
pub mod protocol;

pub use domain::connectivity::ConnectivityState;
pub use domain::identity::EndpointIdentity;
pub use protocol::messages::{MessageContainer, MessageKind, ProtocolError};
