//! The single-slot connectivity signal.
//!
//! [`ConnectivityCell`] is both the authoritative connectivity flag and the
//! channel observers read it from: the value lives inside a
//! `tokio::sync::watch` slot, so a reader can never see the flag and the last
//! published value disagree.
//!
//! Publishing never blocks.  `send_replace` overwrites the slot whether or not
//! anyone is subscribed, so a slow tray icon cannot stall the pumps that
//! report failures.  Observers that fall behind only see the latest value.

use clipsync_core::ConnectivityState;
use tokio::sync::watch;
use tracing::debug;

/// Authoritative connectivity flag plus its status channel.
#[derive(Debug)]
pub struct ConnectivityCell {
    tx: watch::Sender<ConnectivityState>,
}

impl ConnectivityCell {
    /// Creates a cell in the `Disconnected` state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectivityState::Disconnected);
        Self { tx }
    }

    /// Returns the current state.
    pub fn get(&self) -> ConnectivityState {
        *self.tx.borrow()
    }

    /// Stores and publishes `state`, returning the previous value.
    ///
    /// Subscribers are notified even when the value is unchanged; duplicate
    /// notifications are part of the observer contract.
    pub fn set(&self, state: ConnectivityState) -> ConnectivityState {
        let previous = self.tx.send_replace(state);
        if previous != state {
            debug!(%previous, %state, "connectivity changed");
        }
        previous
    }

    /// Atomically moves from `from` to `to`.
    ///
    /// Returns `false` without publishing when the current state is not `from`.
    pub fn transition(&self, from: ConnectivityState, to: ConnectivityState) -> bool {
        let moved = self.tx.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if moved {
            debug!(previous = %from, state = %to, "connectivity changed");
        }
        moved
    }

    /// Returns a receiver that observes every future publication.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityCell {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
