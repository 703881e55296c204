//! Network infrastructure for the client application.
//!
//! Keeps one WebSocket connection to the relay alive for the lifetime of the
//! process and moves [`MessageContainer`]s across it in both directions.
//!
//! Architecture:
//! - [`supervisor::ConnectionSupervisor`] owns the lifecycle: dial (bounded by
//!   a connect timeout), attach pumps, publish status, redial on a fixed period.
//! - [`pump`] holds the reader loop (one task per connection) and the writer
//!   listener (runs inline on whichever task broadcasts).
//! - [`liveness`] sends heartbeat pings and bounds every read by a deadline.
//! - [`registry`] is the fan-out: a per-connection [`registry::ListenerRegistry`]
//!   installed in the process-wide [`registry::OutboundHub`].
//! - [`status`] is the single-slot connectivity signal.
//! - [`transport`] defines the seams; [`ws`] implements them over
//!   tokio-tungstenite and [`mock`] implements them in memory for tests.
//!
//! [`MessageContainer`]: clipsync_core::MessageContainer

use std::time::Duration;

use thiserror::Error;

pub mod connection;
pub mod liveness;
pub mod mock;
pub mod pump;
pub mod registry;
pub mod status;
pub mod supervisor;
pub mod transport;
pub mod ws;

pub use connection::{CloseReason, ConnectionHandle};
pub use liveness::HeartbeatConfig;
pub use registry::{ListenerRegistry, MessageListener, OutboundHub};
pub use status::ConnectivityCell;
pub use supervisor::{CloseHandle, ConnectionSupervisor};
pub use transport::{Connector, FramePair, FrameReader, FrameWriter};
pub use ws::WsConnector;

/// Errors that can occur in the client network layer.
///
/// None of these reach the process top level: the supervisor and the pumps
/// turn every one of them into a state transition plus a log record.
#[derive(Debug, Error)]
pub enum ClientNetworkError {
    /// The dial or the WebSocket upgrade failed.
    #[error("failed to connect to relay at {url}: {reason}")]
    ConnectFailed { url: String, reason: String },
    /// The server URL or a handshake header could not be turned into a request.
    #[error("invalid handshake request: {0}")]
    InvalidRequest(String),
    /// An I/O or framing error on the established connection.
    #[error("transport error: {0}")]
    Transport(String),
    /// No frame arrived before the read deadline.
    #[error("no frame received within {0:?}")]
    ReadTimedOut(Duration),
    /// A write did not complete before the write deadline.
    #[error("write did not complete within {0:?}")]
    WriteTimedOut(Duration),
    /// The connection handle was already closed.
    #[error("connection closed")]
    Closed,
}

/// Timing configuration for the client's network connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConnectionConfig {
    /// How often the reconnect loop checks for a dead connection.
    pub reconnect_period: Duration,
    /// Upper bound on one dial, TCP connect and WebSocket upgrade included.
    pub connect_timeout: Duration,
    /// Read deadline and ping cadence.
    pub heartbeat: HeartbeatConfig,
    /// Upper bound on a single outbound frame write.
    pub write_timeout: Duration,
}

impl Default for ClientConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_period: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(45),
            heartbeat: HeartbeatConfig::default(),
            write_timeout: Duration::from_secs(10),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
