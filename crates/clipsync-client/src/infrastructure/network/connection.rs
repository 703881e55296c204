//! The live connection handle shared by the pumps of one dial.
//!
//! Every successful dial produces exactly one [`ConnectionHandle`].  The
//! reader pump, the heartbeat task, and the writer listener all hold it, and
//! any of them may be the first to notice the connection is dead.  Closing is
//! therefore idempotent: the first [`ConnectionHandle::close`] tears the
//! connection down, retires its outbound registry, and publishes
//! `Disconnected`; every later call returns `false` and does nothing.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clipsync_core::{ConnectivityState, MessageContainer};
use tokio::sync::Mutex;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::registry::OutboundHub;
use super::status::ConnectivityCell;
use super::transport::FrameWriter;
use super::ClientNetworkError;

/// Upper bound on sending the close frame during teardown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a connection was torn down.  Used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The transport reported a read error.
    ReadFailed,
    /// Nothing arrived before the read deadline.
    DeadlineExpired,
    /// The relay sent a close frame or ended the stream.
    PeerClosed,
    /// The inbound handler asked the reader to stop.
    HandlerStopped,
    /// An outbound write failed or timed out.
    WriteFailed,
    /// A heartbeat ping could not be sent.
    HeartbeatFailed,
    /// An external close request.
    Requested,
    /// A newer dial replaced this connection.
    Superseded,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::ReadFailed => "read failed",
            CloseReason::DeadlineExpired => "read deadline expired",
            CloseReason::PeerClosed => "closed by relay",
            CloseReason::HandlerStopped => "inbound handler stopped",
            CloseReason::WriteFailed => "write failed",
            CloseReason::HeartbeatFailed => "heartbeat failed",
            CloseReason::Requested => "close requested",
            CloseReason::Superseded => "superseded by newer connection",
        };
        f.write_str(s)
    }
}

/// One live connection to the relay.
pub struct ConnectionHandle {
    generation: u64,
    server_url: String,
    writer: Mutex<Box<dyn FrameWriter>>,
    closed: AtomicBool,
    cancel: CancellationToken,
    status: Arc<ConnectivityCell>,
    outbound: Arc<OutboundHub>,
}

impl ConnectionHandle {
    pub(crate) fn new(
        generation: u64,
        server_url: String,
        writer: Box<dyn FrameWriter>,
        status: Arc<ConnectivityCell>,
        outbound: Arc<OutboundHub>,
    ) -> Arc<Self> {
        Arc::new(Self {
            generation,
            server_url,
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            status,
            outbound,
        })
    }

    /// Sequence number of the dial that produced this handle.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once the handle has been closed by anyone.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    /// Writes one frame, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// [`ClientNetworkError::Closed`] if the handle is closed,
    /// [`ClientNetworkError::WriteTimedOut`] on timeout, or the transport's
    /// own error.
    pub async fn write(
        &self,
        frame: MessageContainer,
        timeout: Duration,
    ) -> Result<(), ClientNetworkError> {
        if self.is_closed() {
            return Err(ClientNetworkError::Closed);
        }
        let mut writer = self.writer.lock().await;
        match time::timeout(timeout, writer.write_frame(frame)).await {
            Ok(result) => result,
            Err(_) => Err(ClientNetworkError::WriteTimedOut(timeout)),
        }
    }

    /// Tears the connection down.
    ///
    /// Only the first call does any work; it returns `true`.  Close errors are
    /// logged here and never surfaced.
    pub async fn close(&self, reason: CloseReason) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        // Wake the reader and heartbeat tasks first so they stop using the
        // transport while it is being closed.
        self.cancel.cancel();

        // A superseded handle's registry has already been replaced; only the
        // handle that still owns the installed registry may report the drop.
        if self.outbound.retire(self.generation) {
            self.status.set(ConnectivityState::Disconnected);
        }

        let generation = self.generation;
        let result = time::timeout(CLOSE_TIMEOUT, async {
            let mut writer = self.writer.lock().await;
            writer.close().await
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(generation, "failed to close relay connection: {e}"),
            Err(_) => error!(
                generation,
                "failed to close relay connection: no response within {CLOSE_TIMEOUT:?}"
            ),
        }

        info!(generation, server_url = %self.server_url, %reason, "relay connection closed");
        true
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("generation", &self.generation)
            .field("server_url", &self.server_url)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
