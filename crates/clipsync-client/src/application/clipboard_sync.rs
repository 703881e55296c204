//! ClipboardSync: keeps the local clipboard and the relay in step.
//!
//! Two directions:
//!
//! - **Remote → local.**  Every inbound payload is decoded as UTF-8 (lossy),
//!   remembered as the last applied value, and written to the backend.
//! - **Local → remote.**  [`ClipboardSync::watch_local`] polls the backend and
//!   broadcasts each change, unless the new content equals the last value
//!   applied from the relay.  Without that filter every remote update would
//!   bounce straight back to the relay.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use clipsync_core::MessageContainer;
use thiserror::Error;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::inbound::InboundHandler;

/// Error type for clipboard backend operations.
#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("clipboard backend error: {0}")]
    Backend(String),
}

/// Platform-agnostic clipboard access.
#[cfg_attr(test, mockall::automock)]
pub trait ClipboardBackend: Send + Sync {
    /// Current text contents, or `None` when the clipboard holds no text.
    fn read_text(&self) -> Result<Option<String>, ClipboardError>;

    /// Replaces the clipboard contents with `text`.
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Where locally produced messages go.
#[async_trait]
pub trait OutboundSink: Send + Sync {
    async fn broadcast(&self, message: MessageContainer);
}

/// The clipboard sync use case.
pub struct ClipboardSync {
    backend: Arc<dyn ClipboardBackend>,
    /// Last value written on behalf of the relay.
    last_applied: Mutex<Option<String>>,
    /// Last value the local watcher observed.
    last_seen: Mutex<Option<String>>,
}

impl ClipboardSync {
    pub fn new(backend: Arc<dyn ClipboardBackend>) -> Self {
        Self {
            backend,
            last_applied: Mutex::new(None),
            last_seen: Mutex::new(None),
        }
    }

    /// Writes remote clipboard text locally.
    ///
    /// A backend failure is logged; the value still counts as applied so the
    /// watcher will not echo it if the write landed after all.
    pub fn apply_remote(&self, text: &str) {
        *lock(&self.last_applied) = Some(text.to_string());
        match self.backend.write_text(text) {
            Ok(()) => info!(bytes = text.len(), "applied remote clipboard text"),
            Err(e) => warn!("failed to write remote clipboard text: {e}"),
        }
    }

    /// Records the current clipboard contents as already seen, so the first
    /// poll does not publish whatever was on the clipboard at startup.
    pub fn prime(&self) {
        if let Ok(current) = self.backend.read_text() {
            *lock(&self.last_seen) = current;
        }
    }

    /// Reads the clipboard once.
    ///
    /// Returns the new text when it changed since the previous observation
    /// and is not the echo of the last remote value.
    pub fn observe_local(&self) -> Option<String> {
        let current = match self.backend.read_text() {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                debug!("clipboard read failed: {e}");
                return None;
            }
        };

        {
            let mut seen = lock(&self.last_seen);
            if seen.as_deref() == Some(current.as_str()) {
                return None;
            }
            *seen = Some(current.clone());
        }

        if lock(&self.last_applied).as_deref() == Some(current.as_str()) {
            debug!(bytes = current.len(), "suppressing echo of remote clipboard text");
            return None;
        }
        Some(current)
    }

    /// Polls the clipboard every `poll_interval` and broadcasts local changes
    /// through `sink` until `shutdown` is cancelled.
    pub async fn watch_local(
        self: Arc<Self>,
        sink: Arc<dyn OutboundSink>,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) {
        self.prime();
        let mut ticker = time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("clipboard watcher stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            if let Some(text) = self.observe_local() {
                info!(bytes = text.len(), "local clipboard changed");
                sink.broadcast(MessageContainer::text(text)).await;
            }
        }
    }
}

impl InboundHandler for ClipboardSync {
    /// Always `true`: a local apply failure never tears the connection down.
    fn handle(&self, payload: &[u8]) -> bool {
        let text = String::from_utf8_lossy(payload);
        self.apply_remote(&text);
        true
    }
}

fn lock(slot: &Mutex<Option<String>>) -> std::sync::MutexGuard<'_, Option<String>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
