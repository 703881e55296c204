//! The read and write pumps bound to one connection.
//!
//! Reading and writing never wait on each other: the reader runs on its own
//! task and keeps draining inbound frames (which keeps the read deadline
//! fresh), while writes happen on whichever task calls
//! [`OutboundHub::broadcast`](super::registry::OutboundHub::broadcast).
//! The writer is just a [`MessageListener`] registered in the connection's
//! registry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clipsync_core::{MessageContainer, MessageKind};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::application::inbound::InboundHandler;

use super::connection::{CloseReason, ConnectionHandle};
use super::liveness::{read_with_deadline, HeartbeatConfig};
use super::registry::MessageListener;
use super::transport::FrameReader;
use super::ClientNetworkError;

// ── Reader pump ───────────────────────────────────────────────────────────────

pub(crate) fn spawn_reader_pump(
    handle: Arc<ConnectionHandle>,
    reader: Box<dyn FrameReader>,
    inbound: Arc<dyn InboundHandler>,
    heartbeat: HeartbeatConfig,
) -> JoinHandle<CloseReason> {
    tokio::spawn(run_reader_pump(handle, reader, inbound, heartbeat))
}

/// Reads frames until the connection ends, handing data payloads to
/// `inbound`.
///
/// The pump stops when the inbound handler returns `false`, on any read error
/// (including deadline expiry), when the relay closes the stream, or when the
/// handle is closed from elsewhere.  In every case it closes the handle
/// before returning, and reports why it stopped.
pub async fn run_reader_pump(
    handle: Arc<ConnectionHandle>,
    mut reader: Box<dyn FrameReader>,
    inbound: Arc<dyn InboundHandler>,
    heartbeat: HeartbeatConfig,
) -> CloseReason {
    let generation = handle.generation();

    let reason = loop {
        let next = tokio::select! {
            _ = handle.closed() => {
                trace!(generation, "reader pump cancelled");
                break CloseReason::Requested;
            }
            next = read_with_deadline(reader.as_mut(), heartbeat.timeout) => next,
        };

        let frame = match next {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!(generation, "relay ended the stream");
                break CloseReason::PeerClosed;
            }
            Err(ClientNetworkError::ReadTimedOut(deadline)) => {
                warn!(generation, "no frame from relay within {deadline:?}");
                break CloseReason::DeadlineExpired;
            }
            Err(e) => {
                debug!(generation, "read from relay failed: {e}");
                break CloseReason::ReadFailed;
            }
        };

        match frame.kind() {
            MessageKind::Ping | MessageKind::Pong => {
                trace!(generation, kind = ?frame.kind(), "heartbeat frame");
            }
            MessageKind::Close => {
                info!(generation, "relay sent close frame");
                break CloseReason::PeerClosed;
            }
            MessageKind::Text | MessageKind::Binary => {
                debug!(generation, bytes = frame.len(), "inbound frame");
                if !inbound.handle(frame.payload()) {
                    info!(generation, "inbound handler stopped the reader");
                    break CloseReason::HandlerStopped;
                }
            }
        }
    };

    handle.close(reason).await;
    reason
}

// ── Writer pump ───────────────────────────────────────────────────────────────

/// Writes each broadcast message to one connection.
pub struct WriterPump {
    handle: Arc<ConnectionHandle>,
    write_timeout: Duration,
}

impl WriterPump {
    pub fn new(handle: Arc<ConnectionHandle>, write_timeout: Duration) -> Self {
        Self {
            handle,
            write_timeout,
        }
    }
}

#[async_trait]
impl MessageListener for WriterPump {
    async fn on_message(&self, message: &MessageContainer) -> bool {
        let generation = self.handle.generation();
        match self.handle.write(message.clone(), self.write_timeout).await {
            Ok(()) => {
                trace!(generation, bytes = message.len(), "outbound frame written");
                true
            }
            Err(ClientNetworkError::Closed) => false,
            Err(e) => {
                info!(generation, "failed to deliver outbound message: {e}");
                self.handle.close(CloseReason::WriteFailed).await;
                false
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
