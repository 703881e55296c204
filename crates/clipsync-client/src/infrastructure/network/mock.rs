//! In-memory connector for tests.
//!
//! [`MockConnector`] stands in for [`WsConnector`](super::ws::WsConnector).
//! Every successful dial produces a [`MockPeer`], delivered on the channel
//! returned from [`MockConnector::new`].  The peer plays the relay: it pushes
//! frames to the client, reads what the client wrote, and can hang up or make
//! the client's writes fail or stall.
//!
//! # Usage in tests
//!
//! ```ignore
//! let (connector, mut peers) = MockConnector::failing(2);
//! let supervisor = ConnectionSupervisor::new(identity, config, connector.clone(), handler);
//! supervisor.start(shutdown.clone()).await;
//!
//! let peer = peers.recv().await.unwrap();   // arrives on the third dial
//! peer.send(MessageContainer::text("from relay"));
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use clipsync_core::{EndpointIdentity, MessageContainer};
use tokio::sync::mpsc;

use super::transport::{Connector, FramePair, FrameReader, FrameWriter};
use super::ClientNetworkError;

type InboundTx = mpsc::UnboundedSender<Result<MessageContainer, String>>;
type InboundRx = mpsc::UnboundedReceiver<Result<MessageContainer, String>>;

/// Counters shared between a connector and every link it produced.
#[derive(Default)]
struct ConnectorStats {
    attempts: AtomicUsize,
    open: AtomicUsize,
    max_open: AtomicUsize,
}

/// Knobs and counters for one mock link.
#[derive(Default)]
struct LinkState {
    closes: AtomicUsize,
    fail_writes: AtomicBool,
    stall_writes: AtomicBool,
    fail_close: AtomicBool,
}

/// A connector that dials nothing.
pub struct MockConnector {
    failures_remaining: Mutex<usize>,
    stats: Arc<ConnectorStats>,
    peers: mpsc::UnboundedSender<MockPeer>,
}

impl MockConnector {
    /// A connector whose dials always succeed.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockPeer>) {
        Self::failing(0)
    }

    /// A connector whose first `failures` dials fail.
    pub fn failing(failures: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            failures_remaining: Mutex::new(failures),
            stats: Arc::new(ConnectorStats::default()),
            peers,
        });
        (connector, rx)
    }

    /// Makes the next `failures` dials fail.
    pub fn fail_next(&self, failures: usize) {
        *self
            .failures_remaining
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = failures;
    }

    /// Dial attempts so far, failed ones included.
    pub fn attempts(&self) -> usize {
        self.stats.attempts.load(Ordering::SeqCst)
    }

    /// Links dialed and not yet closed by the client.
    pub fn open_connections(&self) -> usize {
        self.stats.open.load(Ordering::SeqCst)
    }

    /// The highest `open_connections` ever observed.
    pub fn max_open_connections(&self) -> usize {
        self.stats.max_open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, identity: &EndpointIdentity) -> Result<FramePair, ClientNetworkError> {
        self.stats.attempts.fetch_add(1, Ordering::SeqCst);

        {
            let mut remaining = self
                .failures_remaining
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ClientNetworkError::ConnectFailed {
                    url: identity.server_url.clone(),
                    reason: "connection refused (mock)".into(),
                });
            }
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let link = Arc::new(LinkState::default());

        let open = self.stats.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_open.fetch_max(open, Ordering::SeqCst);

        let peer = MockPeer {
            identity: identity.clone(),
            inbound: Mutex::new(Some(inbound_tx)),
            outbound: tokio::sync::Mutex::new(outbound_rx),
            link: Arc::clone(&link),
        };
        // Nobody listening for peers is fine; the link then behaves as if the
        // relay hung up immediately.
        let _ = self.peers.send(peer);

        Ok((
            Box::new(MockReader { rx: inbound_rx }),
            Box::new(MockWriter {
                tx: outbound_tx,
                link,
                stats: Arc::clone(&self.stats),
            }),
        ))
    }
}

// ── Peer side ─────────────────────────────────────────────────────────────────

/// The relay's end of one mock link.
pub struct MockPeer {
    identity: EndpointIdentity,
    inbound: Mutex<Option<InboundTx>>,
    outbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<MessageContainer>>,
    link: Arc<LinkState>,
}

impl MockPeer {
    /// The identity the client dialed with.
    pub fn identity(&self) -> &EndpointIdentity {
        &self.identity
    }

    /// Pushes `frame` to the client.  Returns `false` after a hang-up or once
    /// the client's reader is gone.
    pub fn send(&self, frame: MessageContainer) -> bool {
        self.push(Ok(frame))
    }

    /// Makes the client's next read fail with a transport error.
    pub fn send_error(&self, reason: &str) -> bool {
        self.push(Err(reason.to_string()))
    }

    /// Ends the stream; the client's reader sees end-of-stream.
    pub fn hang_up(&self) {
        self.inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Waits for the next frame the client wrote, heartbeats included.
    ///
    /// Returns `None` once the client's writer is gone.
    pub async fn next_outbound(&self) -> Option<MessageContainer> {
        self.outbound.lock().await.recv().await
    }

    /// Waits for the next data frame the client wrote, skipping heartbeats.
    pub async fn next_data(&self) -> Option<MessageContainer> {
        let mut rx = self.outbound.lock().await;
        loop {
            let frame = rx.recv().await?;
            if frame.kind().is_data() {
                return Some(frame);
            }
        }
    }

    /// Returns a frame the client already wrote, without waiting.
    pub fn try_next_outbound(&self) -> Option<MessageContainer> {
        self.outbound.try_lock().ok()?.try_recv().ok()
    }

    /// How many times the client called `close` on its writer.
    pub fn close_calls(&self) -> usize {
        self.link.closes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.close_calls() > 0
    }

    /// Makes every client write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.link.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every client write hang until the client gives up.
    pub fn set_stall_writes(&self, stall: bool) {
        self.link.stall_writes.store(stall, Ordering::SeqCst);
    }

    /// Makes the client's close call report an error.
    pub fn set_fail_close(&self, fail: bool) {
        self.link.fail_close.store(fail, Ordering::SeqCst);
    }

    fn push(&self, item: Result<MessageContainer, String>) -> bool {
        match self
            .inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(tx) => tx.send(item).is_ok(),
            None => false,
        }
    }
}

// ── Client side ───────────────────────────────────────────────────────────────

struct MockReader {
    rx: InboundRx,
}

#[async_trait]
impl FrameReader for MockReader {
    async fn read_frame(&mut self) -> Result<Option<MessageContainer>, ClientNetworkError> {
        match self.rx.recv().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(reason)) => Err(ClientNetworkError::Transport(reason)),
            None => Ok(None),
        }
    }
}

struct MockWriter {
    tx: mpsc::UnboundedSender<MessageContainer>,
    link: Arc<LinkState>,
    stats: Arc<ConnectorStats>,
}

#[async_trait]
impl FrameWriter for MockWriter {
    async fn write_frame(&mut self, frame: MessageContainer) -> Result<(), ClientNetworkError> {
        if self.link.stall_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.link.fail_writes.load(Ordering::SeqCst) {
            return Err(ClientNetworkError::Transport("broken pipe (mock)".into()));
        }
        self.tx
            .send(frame)
            .map_err(|_| ClientNetworkError::Transport("relay went away (mock)".into()))
    }

    async fn close(&mut self) -> Result<(), ClientNetworkError> {
        if self.link.closes.fetch_add(1, Ordering::SeqCst) == 0 {
            self.stats.open.fetch_sub(1, Ordering::SeqCst);
        }
        if self.link.fail_close.load(Ordering::SeqCst) {
            return Err(ClientNetworkError::Transport("close failed (mock)".into()));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
