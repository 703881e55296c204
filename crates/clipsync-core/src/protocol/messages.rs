//! Frame types exchanged with the relay server.
//!
//! The relay protocol is deliberately thin: every frame is a kind code plus an
//! opaque payload.  Clipboard text travels as `Text` frames; the liveness
//! monitor uses `Ping`/`Pong`; either side may send `Close` to end the
//! session.  Kind codes equal the WebSocket opcodes (RFC 6455 §5.2).

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Handshake constants ───────────────────────────────────────────────────────

/// Request header carrying the client's operating-system name.
pub const SYSTEM_NAME_HEADER: &str = "SystemName";

/// Request header carrying the client's human-readable device name.
pub const DEVICE_NAME_HEADER: &str = "DeviceName";

/// Errors raised while interpreting frame metadata.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The kind byte is not one of the known opcodes.
    #[error("unknown message kind: 0x{0:02X}")]
    UnknownMessageKind(u8),
}

// ── Message kinds ─────────────────────────────────────────────────────────────

/// The kind of a [`MessageContainer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageKind {
    /// UTF-8 payload; the normal kind for clipboard text.
    Text = 0x01,
    /// Arbitrary bytes.
    Binary = 0x02,
    /// Session end requested by the sender.
    Close = 0x08,
    /// Heartbeat probe.
    Ping = 0x09,
    /// Heartbeat acknowledgement.
    Pong = 0x0A,
}

impl MessageKind {
    /// Returns `true` for the heartbeat kinds (`Ping` and `Pong`).
    pub fn is_heartbeat(self) -> bool {
        matches!(self, MessageKind::Ping | MessageKind::Pong)
    }

    /// Returns `true` for kinds that carry application data.
    pub fn is_data(self) -> bool {
        matches!(self, MessageKind::Text | MessageKind::Binary)
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MessageKind::Text),
            0x02 => Ok(MessageKind::Binary),
            0x08 => Ok(MessageKind::Close),
            0x09 => Ok(MessageKind::Ping),
            0x0A => Ok(MessageKind::Pong),
            other => Err(ProtocolError::UnknownMessageKind(other)),
        }
    }
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> Self {
        kind as u8
    }
}

// ── Container ─────────────────────────────────────────────────────────────────

/// The unit of transfer in both directions.
///
/// Fields are private so a container cannot be mutated after it has been
/// handed to the fan-out; clone it to pass it on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContainer {
    kind: MessageKind,
    payload: Vec<u8>,
}

impl MessageContainer {
    /// Builds a container of any kind.
    pub fn new(kind: MessageKind, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// A `Text` frame carrying `text` as UTF-8.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Text, text.into().into_bytes())
    }

    /// A `Binary` frame.
    pub fn binary(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(MessageKind::Binary, payload)
    }

    /// An empty heartbeat probe.
    pub fn ping() -> Self {
        Self::new(MessageKind::Ping, Vec::new())
    }

    /// An empty heartbeat acknowledgement.
    pub fn pong() -> Self {
        Self::new(MessageKind::Pong, Vec::new())
    }

    /// An empty close frame.
    pub fn close() -> Self {
        Self::new(MessageKind::Close, Vec::new())
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Consumes the container, returning the raw payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
