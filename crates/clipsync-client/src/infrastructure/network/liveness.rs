//! Heartbeat-based liveness detection.
//!
//! Two halves:
//!
//! - Every read is bounded by [`HeartbeatConfig::timeout`]
//!   ([`read_with_deadline`]).  Because the deadline restarts with each read,
//!   any inbound frame (data or heartbeat acknowledgement) renews it.
//! - A heartbeat task sends a `Ping` every [`HeartbeatConfig::ping_period`]
//!   (nine tenths of the timeout), so the relay's `Pong` normally lands well
//!   before the deadline.
//!
//! A silent connection therefore fails within one timeout of the last frame,
//! and shows up to the reader pump as an ordinary read error.

use std::sync::Arc;
use std::time::Duration;

use clipsync_core::MessageContainer;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, trace};

use super::connection::{CloseReason, ConnectionHandle};
use super::transport::FrameReader;
use super::ClientNetworkError;

/// How long the reader waits for any frame before declaring the link dead.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Read deadline, renewed on every inbound frame.
    pub timeout: Duration,
}

impl HeartbeatConfig {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Interval between outbound pings: 9/10 of the timeout.
    pub fn ping_period(&self) -> Duration {
        self.timeout * 9 / 10
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_TIMEOUT)
    }
}

/// Reads one frame, failing with [`ClientNetworkError::ReadTimedOut`] if
/// nothing arrives within `deadline`.
pub async fn read_with_deadline(
    reader: &mut (dyn FrameReader + '_),
    deadline: Duration,
) -> Result<Option<MessageContainer>, ClientNetworkError> {
    match time::timeout(deadline, reader.read_frame()).await {
        Ok(result) => result,
        Err(_) => Err(ClientNetworkError::ReadTimedOut(deadline)),
    }
}

/// Spawns the ping task for `handle`.  It exits when the handle closes, and
/// closes the handle itself if a ping cannot be written.
pub(crate) fn spawn_heartbeat(
    handle: Arc<ConnectionHandle>,
    config: HeartbeatConfig,
    write_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let generation = handle.generation();
        let mut ticker = time::interval(config.ping_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // first tick is immediate

        loop {
            tokio::select! {
                _ = handle.closed() => {
                    trace!(generation, "heartbeat stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = handle.write(MessageContainer::ping(), write_timeout).await {
                debug!(generation, "heartbeat ping failed: {e}");
                handle.close(CloseReason::HeartbeatFailed).await;
                return;
            }
            trace!(generation, "heartbeat ping sent");
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
