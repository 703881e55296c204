//! Connection lifecycle: dial, attach pumps, redial on a fixed period.
//!
//! # State machine
//!
//! ```text
//!              dial()                 connect ok
//! Disconnected ──────> Connecting ───────────────> Connected
//!      ^                   │                           │
//!      │   connect failed  │      pump failure /       │
//!      └───────────────────┘      close request        │
//!      ^                                               │
//!      └───────────────────────────────────────────────┘
//! ```
//!
//! Failures never trigger a redial directly.  They only move the state to
//! `Disconnected`; the reconnect loop notices on its next tick and awaits a
//! single `dial()` inline.  Repeated failures therefore cost one dial per
//! period and never pile up tasks.
//!
//! A dial is bounded by [`ClientConnectionConfig::connect_timeout`], and every
//! inline dial also races the shutdown token, so a relay that accepts TCP but
//! never completes the upgrade cannot wedge the loop.
//!
//! # Tasks
//!
//! - the reconnect loop (until shutdown),
//! - the close-request listener (until shutdown),
//! - per connection: one reader pump and one heartbeat task.
//!
//! The writer runs on the producer's task inside
//! [`OutboundHub::broadcast`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clipsync_core::{ConnectivityState, EndpointIdentity};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::inbound::InboundHandler;

use super::connection::{CloseReason, ConnectionHandle};
use super::liveness::spawn_heartbeat;
use super::pump::{spawn_reader_pump, WriterPump};
use super::registry::{ListenerRegistry, OutboundHub};
use super::status::ConnectivityCell;
use super::transport::Connector;
use super::{ClientConnectionConfig, ClientNetworkError};

/// Pending close requests beyond this are coalesced.
const CLOSE_CHANNEL_CAPACITY: usize = 4;

/// Sends close requests to a running supervisor.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    tx: mpsc::Sender<()>,
}

impl CloseHandle {
    /// Asks the supervisor to close the current connection.
    ///
    /// Never blocks.  Returns `false` only when the close listener is not
    /// running (not started yet, or shut down).
    pub fn request_close(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => {
                debug!("close requested but the close listener is not running");
                false
            }
        }
    }
}

/// Owns the connection to the relay for the lifetime of the process.
pub struct ConnectionSupervisor {
    identity: Arc<EndpointIdentity>,
    config: ClientConnectionConfig,
    connector: Arc<dyn Connector>,
    inbound: Arc<dyn InboundHandler>,
    status: Arc<ConnectivityCell>,
    outbound: Arc<OutboundHub>,
    current: Mutex<Option<Arc<ConnectionHandle>>>,
    generation: AtomicU64,
    started: AtomicBool,
    close_tx: mpsc::Sender<()>,
    close_rx: Mutex<Option<mpsc::Receiver<()>>>,
}

impl ConnectionSupervisor {
    /// Creates a supervisor.  Nothing is dialed until [`start`](Self::start).
    pub fn new(
        identity: EndpointIdentity,
        config: ClientConnectionConfig,
        connector: Arc<dyn Connector>,
        inbound: Arc<dyn InboundHandler>,
    ) -> Arc<Self> {
        let (close_tx, close_rx) = mpsc::channel(CLOSE_CHANNEL_CAPACITY);
        Arc::new(Self {
            identity: Arc::new(identity),
            config,
            connector,
            inbound,
            status: Arc::new(ConnectivityCell::new()),
            outbound: Arc::new(OutboundHub::new()),
            current: Mutex::new(None),
            generation: AtomicU64::new(0),
            started: AtomicBool::new(false),
            close_tx,
            close_rx: Mutex::new(Some(close_rx)),
        })
    }

    /// The producer-facing broadcast entry point.
    pub fn outbound(&self) -> Arc<OutboundHub> {
        Arc::clone(&self.outbound)
    }

    /// Subscribes to connectivity changes.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectivityState> {
        self.status.subscribe()
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.status.get()
    }

    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            tx: self.close_tx.clone(),
        }
    }

    pub fn identity(&self) -> &EndpointIdentity {
        &self.identity
    }

    /// The most recently dialed connection, open or not.
    pub fn current_connection(&self) -> Option<Arc<ConnectionHandle>> {
        self.current_slot().clone()
    }

    /// Starts the lifecycle: spawns the reconnect loop and the close-request
    /// listener, then performs the first dial.
    ///
    /// Only the first call does anything; later calls log a warning and
    /// return `None`.  Otherwise returns the reconnect loop's task, which
    /// finishes once `shutdown` is cancelled.
    pub async fn start(self: &Arc<Self>, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        if self.started.swap(true, Ordering::AcqRel) {
            warn!("connection supervisor already started");
            return None;
        }

        let close_rx = self
            .close_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(rx) = close_rx {
            tokio::spawn(Arc::clone(self).close_listener(rx, shutdown.clone()));
        }

        let reconnect = tokio::spawn(Arc::clone(self).reconnect_loop(shutdown.clone()));
        self.dial_until_cancelled(&shutdown).await;
        Some(reconnect)
    }

    /// Attempts one connection.
    ///
    /// On success the pumps are attached and `Connected` is published; on
    /// failure, including a dial that outlives `connect_timeout`,
    /// `Disconnected` is published.  Never retries by itself.
    /// Returns whether the dial succeeded.
    pub async fn dial(&self) -> bool {
        self.status.set(ConnectivityState::Connecting);

        let timeout = self.config.connect_timeout;
        let connected = match time::timeout(timeout, self.connector.connect(&self.identity)).await {
            Ok(result) => result,
            Err(_) => Err(ClientNetworkError::ConnectFailed {
                url: self.identity.server_url.clone(),
                reason: format!("no handshake within {timeout:?}"),
            }),
        };
        let (reader, writer) = match connected {
            Ok(pair) => pair,
            Err(e) => {
                warn!(server_url = %self.identity.server_url, "could not connect to relay: {e}");
                self.status.set(ConnectivityState::Disconnected);
                return false;
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = ConnectionHandle::new(
            generation,
            self.identity.server_url.clone(),
            writer,
            Arc::clone(&self.status),
            Arc::clone(&self.outbound),
        );

        let registry = Arc::new(ListenerRegistry::new());
        registry.add_message_listener(Arc::new(WriterPump::new(
            Arc::clone(&handle),
            self.config.write_timeout,
        )));

        // Publish before installing: once the registry is reachable a failing
        // write may publish Disconnected, and that must be the last word.
        self.status.set(ConnectivityState::Connected);
        self.outbound.install(generation, registry);

        let previous = self.current_slot().replace(Arc::clone(&handle));
        if let Some(old) = previous {
            old.close(CloseReason::Superseded).await;
        }

        spawn_reader_pump(
            Arc::clone(&handle),
            reader,
            Arc::clone(&self.inbound),
            self.config.heartbeat,
        );
        spawn_heartbeat(handle, self.config.heartbeat, self.config.write_timeout);

        info!(generation, server_url = %self.identity.server_url, "connected to relay");
        true
    }

    /// Closes the current connection, if there is one.
    ///
    /// The reconnect loop redials on its next tick.
    pub async fn close_current(&self) {
        let current = self.current_connection();
        match current {
            Some(handle) => {
                if !handle.close(CloseReason::Requested).await {
                    debug!(generation = handle.generation(), "connection was already closed");
                }
            }
            None => debug!("close requested with no connection"),
        }
    }

    /// Runs [`dial`](Self::dial) unless `shutdown` fires first.  An abandoned
    /// dial leaves the state `Disconnected`.
    async fn dial_until_cancelled(&self, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            connected = self.dial() => connected,
            _ = shutdown.cancelled() => {
                self.status
                    .transition(ConnectivityState::Connecting, ConnectivityState::Disconnected);
                info!("shutdown requested; dial abandoned");
                false
            }
        }
    }

    async fn reconnect_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = time::interval(self.config.reconnect_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // first tick is immediate

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested; reconnect loop stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if self
                        .status
                        .transition(ConnectivityState::Disconnected, ConnectivityState::Connecting)
                    {
                        info!(server_url = %self.identity.server_url, "retrying connection to relay");
                        self.dial_until_cancelled(&shutdown).await;
                    }
                }
            }
        }
    }

    async fn close_listener(self: Arc<Self>, mut rx: mpsc::Receiver<()>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                request = rx.recv() => match request {
                    Some(()) => {
                        info!("close requested");
                        self.close_current().await;
                    }
                    None => return,
                },
            }
        }
    }

    fn current_slot(&self) -> MutexGuard<'_, Option<Arc<ConnectionHandle>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
