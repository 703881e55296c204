//! Outbound fan-out: listener registries and the hub producers talk to.
//!
//! # Two levels
//!
//! - [`ListenerRegistry`] is an ordered, append-only list of
//!   [`MessageListener`]s.  `broadcast` calls each one in registration order
//!   on the caller's task.  A listener that answers `false` stays in the list;
//!   it is simply counted as not viable.
//!
//! - [`OutboundHub`] is what producers hold.  It points at the registry of the
//!   *current* connection, tagged with that connection's generation.  When a
//!   connection dies its registry is retired as a whole, so dead writers never
//!   accumulate and a broadcast after a reconnect only reaches the new writer.
//!
//! While no registry is installed, broadcasts are dropped with a debug record.
//! Nothing is queued for later delivery.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use clipsync_core::MessageContainer;
use tracing::{debug, trace};

use crate::application::clipboard_sync::OutboundSink;

/// A consumer of outbound messages.
#[async_trait]
pub trait MessageListener: Send + Sync {
    /// Handles one message.  Returns `false` once the listener can no longer
    /// accept messages (e.g. its connection failed).
    async fn on_message(&self, message: &MessageContainer) -> bool;
}

// ── ListenerRegistry ──────────────────────────────────────────────────────────

/// Ordered, append-only set of listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Vec<Arc<dyn MessageListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `listener`.  Safe to call while a broadcast is running; the
    /// running broadcast works on a snapshot and will not see it.
    pub fn add_message_listener(&self, listener: Arc<dyn MessageListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `message` to every listener in registration order.
    ///
    /// Returns how many listeners reported themselves still viable.
    pub async fn broadcast(&self, message: &MessageContainer) -> usize {
        // The lock is never held across an await.
        let snapshot: Vec<Arc<dyn MessageListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut viable = 0;
        for listener in snapshot {
            if listener.on_message(message).await {
                viable += 1;
            }
        }
        viable
    }
}

// ── OutboundHub ───────────────────────────────────────────────────────────────

struct Installed {
    generation: u64,
    registry: Arc<ListenerRegistry>,
}

/// Producer-facing entry point for outbound messages.
#[derive(Default)]
pub struct OutboundHub {
    current: RwLock<Option<Installed>>,
    dropped: AtomicU64,
}

impl OutboundHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `registry` the target of future broadcasts, replacing whatever
    /// registry was installed before.
    pub(crate) fn install(&self, generation: u64, registry: Arc<ListenerRegistry>) {
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = slot.replace(Installed {
            generation,
            registry,
        }) {
            debug!(
                previous = old.generation,
                generation, "replaced outbound registry"
            );
        }
    }

    /// Removes the registry of `generation` if it is still the installed one.
    ///
    /// Returns `true` when this call removed it.  A stale generation leaves
    /// the newer registry in place and returns `false`.
    pub(crate) fn retire(&self, generation: u64) -> bool {
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(installed) if installed.generation == generation => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Generation of the installed registry, if any.
    pub fn current_generation(&self) -> Option<u64> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|installed| installed.generation)
    }

    /// Number of messages dropped because no connection was live.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Sends `message` to the current connection's listeners.
    ///
    /// Awaits the writes inline, so successive calls from one task reach the
    /// transport in call order.  Never returns an error: with no live
    /// connection the message is dropped.
    pub async fn broadcast(&self, message: MessageContainer) {
        let target = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|installed| (installed.generation, Arc::clone(&installed.registry)));

        match target {
            Some((generation, registry)) => {
                let viable = registry.broadcast(&message).await;
                trace!(generation, viable, bytes = message.len(), "broadcast outbound message");
                if viable == 0 {
                    debug!(generation, "outbound message reached no viable listener");
                }
            }
            None => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(
                    kind = ?message.kind(),
                    bytes = message.len(),
                    "no live connection; dropping outbound message"
                );
            }
        }
    }
}

#[async_trait]
impl OutboundSink for OutboundHub {
    async fn broadcast(&self, message: MessageContainer) {
        OutboundHub::broadcast(self, message).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
