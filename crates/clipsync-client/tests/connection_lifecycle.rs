//! Integration tests for the connection supervisor.
//!
//! These drive `ConnectionSupervisor` through its public API against the
//! in-memory `MockConnector`, the same way the binary drives it against the
//! WebSocket connector.  They cover:
//!
//! - reconnect convergence after failed dials, with at most one open link,
//! - dials that never finish the handshake, and shutdown during such a dial,
//! - outbound ordering within one connection,
//! - idempotent close, including external close requests,
//! - heartbeat renewal and heartbeat failure,
//! - outbound routing after a reconnect,
//! - drop-with-log while disconnected,
//! - the write deadline.
//!
//! Timer-driven tests run with `start_paused = true`: the runtime jumps the
//! clock forward whenever every task is waiting, so a 30 s heartbeat timeout
//! costs no wall-clock time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use clipsync_client::infrastructure::network::mock::{MockConnector, MockPeer};
use clipsync_client::infrastructure::network::{
    ClientConnectionConfig, ClientNetworkError, CloseReason, ConnectionSupervisor, Connector,
    FramePair,
};
use clipsync_core::{ConnectivityState, EndpointIdentity, MessageContainer, MessageKind};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn identity() -> EndpointIdentity {
    EndpointIdentity::new("ws://relay.test:8090/ws", "linux", "integration")
}

/// Supervisor whose inbound payloads are collected into the returned list.
fn supervisor_with_log(
    connector: Arc<MockConnector>,
) -> (Arc<ConnectionSupervisor>, Arc<Mutex<Vec<Vec<u8>>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let supervisor = ConnectionSupervisor::new(
        identity(),
        ClientConnectionConfig::default(),
        connector,
        Arc::new(move |payload: &[u8]| {
            sink.lock().unwrap().push(payload.to_vec());
            true
        }),
    );
    (supervisor, log)
}

async fn next_peer(peers: &mut mpsc::UnboundedReceiver<MockPeer>) -> MockPeer {
    peers.recv().await.expect("connector dropped")
}

/// A relay that accepts the TCP connection and never answers the upgrade.
#[derive(Default)]
struct HangingConnector {
    attempts: AtomicUsize,
}

#[async_trait]
impl Connector for HangingConnector {
    async fn connect(&self, _identity: &EndpointIdentity) -> Result<FramePair, ClientNetworkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

fn hanging_supervisor() -> (Arc<ConnectionSupervisor>, Arc<HangingConnector>) {
    let connector = Arc::new(HangingConnector::default());
    let supervisor = ConnectionSupervisor::new(
        identity(),
        ClientConnectionConfig::default(),
        Arc::clone(&connector) as Arc<dyn Connector>,
        Arc::new(|_: &[u8]| true),
    );
    (supervisor, connector)
}

// ── Reconnect convergence ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_reconnect_converges_after_failed_dials_with_single_open_link() {
    // Arrange – the first three dials are refused
    let (connector, mut peers) = MockConnector::failing(3);
    let (supervisor, _log) = supervisor_with_log(Arc::clone(&connector));
    let shutdown = CancellationToken::new();
    let started = Instant::now();

    // Act
    let reconnect = supervisor.start(shutdown.clone()).await.expect("first start");
    assert_eq!(supervisor.connectivity(), ConnectivityState::Disconnected);
    let _peer = next_peer(&mut peers).await;

    // Assert – initial dial + one redial per 5 s tick
    assert_eq!(connector.attempts(), 4);
    assert!(started.elapsed() < Duration::from_secs(16));
    assert_eq!(supervisor.connectivity(), ConnectivityState::Connected);

    // Let the silent relay time the link out a few times.
    time::sleep(Duration::from_secs(120)).await;
    assert!(connector.attempts() > 4, "dead links must be redialed");
    assert_eq!(connector.max_open_connections(), 1);

    shutdown.cancel();
    reconnect.await.expect("reconnect loop exits");
}

#[tokio::test(start_paused = true)]
async fn test_read_error_drops_link_and_redial_retries_until_relay_is_back() {
    // Arrange
    let (connector, mut peers) = MockConnector::new();
    let (supervisor, _log) = supervisor_with_log(Arc::clone(&connector));
    let shutdown = CancellationToken::new();
    supervisor.start(shutdown.clone()).await;
    let first = next_peer(&mut peers).await;
    let handle = supervisor.current_connection().expect("handle");

    // Act – the relay resets the link and refuses the next two dials
    connector.fail_next(2);
    first.send_error("connection reset by peer");
    handle.closed().await;
    let _second = next_peer(&mut peers).await;

    // Assert
    assert_eq!(connector.attempts(), 4);
    assert_eq!(connector.max_open_connections(), 1);
    assert_eq!(supervisor.connectivity(), ConnectivityState::Connected);
    shutdown.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_connected_supervisor_does_not_redial() {
    // Arrange
    let (connector, mut peers) = MockConnector::new();
    let (supervisor, _log) = supervisor_with_log(Arc::clone(&connector));
    let shutdown = CancellationToken::new();
    supervisor.start(shutdown.clone()).await;
    let peer = next_peer(&mut peers).await;

    // Act – keep the link alive across several reconnect ticks
    for _ in 0..3 {
        let ping = peer.next_outbound().await.expect("ping");
        assert_eq!(ping.kind(), MessageKind::Ping);
        peer.send(MessageContainer::pong());
    }

    // Assert
    assert_eq!(connector.attempts(), 1);
    shutdown.cancel();
}

// ── Unanswered handshakes ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_unanswered_handshake_times_out_and_loop_keeps_redialing() {
    // Arrange
    let (supervisor, connector) = hanging_supervisor();
    let shutdown = CancellationToken::new();
    let started = Instant::now();

    // Act – the first dial gives up after the 45 s connect timeout
    let reconnect = supervisor.start(shutdown.clone()).await.expect("first start");

    // Assert
    assert!(started.elapsed() >= Duration::from_secs(45));
    assert!(started.elapsed() < Duration::from_secs(46));
    assert_eq!(supervisor.connectivity(), ConnectivityState::Disconnected);
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);

    // The loop is not wedged: it keeps dialing on later ticks.
    time::sleep(Duration::from_secs(60)).await;
    assert!(connector.attempts.load(Ordering::SeqCst) >= 2);

    // Shutdown lands while a redial is hanging.
    shutdown.cancel();
    time::timeout(Duration::from_secs(1), reconnect)
        .await
        .expect("reconnect loop stops on shutdown")
        .expect("reconnect loop task");
    assert_eq!(supervisor.connectivity(), ConnectivityState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_first_dial_lets_start_return() {
    // Arrange
    let (supervisor, connector) = hanging_supervisor();
    let shutdown = CancellationToken::new();
    let starter = {
        let supervisor = Arc::clone(&supervisor);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { supervisor.start(shutdown).await })
    };
    time::sleep(Duration::from_secs(10)).await;
    assert_eq!(supervisor.connectivity(), ConnectivityState::Connecting);

    // Act
    shutdown.cancel();
    let reconnect = time::timeout(Duration::from_secs(1), starter)
        .await
        .expect("start returns after shutdown")
        .expect("start task")
        .expect("first start");

    // Assert
    time::timeout(Duration::from_secs(1), reconnect)
        .await
        .expect("reconnect loop stops on shutdown")
        .expect("reconnect loop task");
    assert_eq!(supervisor.connectivity(), ConnectivityState::Disconnected);
    assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
}

// ── Ordering ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_broadcasts_reach_the_relay_in_call_order() {
    // Arrange
    let (connector, mut peers) = MockConnector::new();
    let (supervisor, _log) = supervisor_with_log(connector);
    assert!(supervisor.dial().await);
    let peer = next_peer(&mut peers).await;
    let hub = supervisor.outbound();

    // Act
    for i in 0..50 {
        hub.broadcast(MessageContainer::text(format!("clip-{i}"))).await;
    }

    // Assert
    for i in 0..50 {
        let frame = peer.next_data().await.expect("data frame");
        assert_eq!(frame.payload(), format!("clip-{i}").as_bytes());
    }
}

#[tokio::test]
async fn test_inbound_payloads_are_handled_in_arrival_order() {
    // Arrange
    let (connector, mut peers) = MockConnector::new();
    let (supervisor, log) = supervisor_with_log(connector);
    supervisor.dial().await;
    let peer = next_peer(&mut peers).await;

    // Act
    peer.send(MessageContainer::text("first"));
    peer.send(MessageContainer::pong());
    peer.send(MessageContainer::binary(vec![2u8]));
    peer.hang_up();
    supervisor
        .current_connection()
        .expect("handle")
        .closed()
        .await;

    // Assert – heartbeat frames never reach the handler
    assert_eq!(*log.lock().unwrap(), vec![b"first".to_vec(), vec![2u8]]);
}

// ── Idempotent close ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_racing_closes_tear_the_link_down_once() {
    // Arrange
    let (connector, mut peers) = MockConnector::new();
    let (supervisor, _log) = supervisor_with_log(Arc::clone(&connector));
    supervisor.dial().await;
    let peer = next_peer(&mut peers).await;
    let handle = supervisor.current_connection().expect("handle");

    // Act
    let (a, b, c) = tokio::join!(
        handle.close(CloseReason::ReadFailed),
        handle.close(CloseReason::WriteFailed),
        handle.close(CloseReason::Requested),
    );

    // Assert
    assert_eq!([a, b, c].iter().filter(|won| **won).count(), 1);
    assert_eq!(peer.close_calls(), 1);
    assert_eq!(connector.open_connections(), 0);
    assert_eq!(supervisor.connectivity(), ConnectivityState::Disconnected);
}

#[tokio::test]
async fn test_close_failure_is_absorbed() {
    let (connector, mut peers) = MockConnector::new();
    let (supervisor, _log) = supervisor_with_log(connector);
    supervisor.dial().await;
    let peer = next_peer(&mut peers).await;
    peer.set_fail_close(true);

    let handle = supervisor.current_connection().expect("handle");
    let closed = handle.close(CloseReason::Requested).await;

    assert!(closed);
    assert_eq!(supervisor.connectivity(), ConnectivityState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_close_request_drops_link_and_reconnect_loop_redials() {
    // Arrange
    let (connector, mut peers) = MockConnector::new();
    let (supervisor, _log) = supervisor_with_log(Arc::clone(&connector));
    let shutdown = CancellationToken::new();
    supervisor.start(shutdown.clone()).await;
    let first = next_peer(&mut peers).await;
    let handle = supervisor.current_connection().expect("handle");

    // Act
    assert!(supervisor.close_handle().request_close());
    handle.closed().await;
    let second = next_peer(&mut peers).await;

    // Assert
    assert_eq!(first.close_calls(), 1);
    assert!(!second.is_closed());
    assert_eq!(connector.attempts(), 2);
    assert_eq!(
        supervisor.current_connection().expect("new handle").generation(),
        2
    );
    shutdown.cancel();
}

// ── Heartbeat ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_answered_pings_keep_the_link_alive() {
    // Arrange
    let (connector, mut peers) = MockConnector::new();
    let (supervisor, _log) = supervisor_with_log(Arc::clone(&connector));
    supervisor.dial().await;
    let peer = next_peer(&mut peers).await;
    let started = Instant::now();

    // Act – answer five pings; well past the 30 s deadline in total
    for _ in 0..5 {
        let ping = peer.next_outbound().await.expect("ping");
        assert_eq!(ping.kind(), MessageKind::Ping);
        peer.send(MessageContainer::pong());
    }

    // Assert
    assert!(started.elapsed() >= Duration::from_secs(5 * 27));
    assert!(!supervisor.current_connection().expect("handle").is_closed());
    assert_eq!(supervisor.connectivity(), ConnectivityState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_data_frames_also_renew_the_read_deadline() {
    let (connector, mut peers) = MockConnector::new();
    let (supervisor, log) = supervisor_with_log(connector);
    supervisor.dial().await;
    let peer = next_peer(&mut peers).await;

    // Data every 20 s, pings never answered.
    for i in 0..4 {
        time::sleep(Duration::from_secs(20)).await;
        peer.send(MessageContainer::text(format!("tick-{i}")));
    }
    time::sleep(Duration::from_secs(1)).await;

    assert_eq!(log.lock().unwrap().len(), 4);
    assert_eq!(supervisor.connectivity(), ConnectivityState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_silent_relay_fails_within_timeout_plus_ping_period() {
    // Arrange
    let (connector, mut peers) = MockConnector::new();
    let (supervisor, _log) = supervisor_with_log(connector);
    let config = ClientConnectionConfig::default();
    supervisor.dial().await;
    let peer = next_peer(&mut peers).await;
    let handle = supervisor.current_connection().expect("handle");
    let started = Instant::now();

    // Act – the relay never answers
    handle.closed().await;

    // Assert
    let elapsed = started.elapsed();
    assert!(elapsed >= config.heartbeat.ping_period());
    assert!(elapsed <= config.heartbeat.timeout + config.heartbeat.ping_period());
    assert_eq!(peer.close_calls(), 1);
    assert_eq!(supervisor.connectivity(), ConnectivityState::Disconnected);
}

// ── Routing across reconnects ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_after_reconnect_broadcasts_reach_only_the_new_link() {
    // Arrange
    let (connector, mut peers) = MockConnector::new();
    let (supervisor, _log) = supervisor_with_log(connector);
    let shutdown = CancellationToken::new();
    supervisor.start(shutdown.clone()).await;
    let hub = supervisor.outbound();

    let old = next_peer(&mut peers).await;
    hub.broadcast(MessageContainer::text("before")).await;
    assert_eq!(old.next_data().await.expect("before").payload(), b"before");

    // Act – relay drops the first link; the loop redials
    let old_handle = supervisor.current_connection().expect("handle");
    old.hang_up();
    old_handle.closed().await;
    let new = next_peer(&mut peers).await;
    hub.broadcast(MessageContainer::text("after")).await;

    // Assert
    assert_eq!(new.next_data().await.expect("after").payload(), b"after");
    assert!(old.try_next_outbound().is_none());
    assert_eq!(hub.current_generation(), Some(2));
    shutdown.cancel();
}

// ── Disconnected drops ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_broadcast_while_disconnected_is_dropped_not_queued() {
    // Arrange – first dial fails, second succeeds on the next tick
    let (connector, mut peers) = MockConnector::failing(1);
    let (supervisor, _log) = supervisor_with_log(connector);
    let shutdown = CancellationToken::new();
    supervisor.start(shutdown.clone()).await;
    let hub = supervisor.outbound();

    // Act
    hub.broadcast(MessageContainer::text("lost")).await;
    let peer = next_peer(&mut peers).await;
    hub.broadcast(MessageContainer::text("delivered")).await;

    // Assert
    assert_eq!(hub.dropped_count(), 1);
    let first = peer.next_data().await.expect("data");
    assert_eq!(first.payload(), b"delivered");
    shutdown.cancel();
}

// ── Write deadline ────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_stalled_write_times_out_and_closes_the_link() {
    // Arrange
    let (connector, mut peers) = MockConnector::new();
    let (supervisor, _log) = supervisor_with_log(connector);
    let config = ClientConnectionConfig::default();
    supervisor.dial().await;
    let peer = next_peer(&mut peers).await;
    peer.set_stall_writes(true);
    let handle = supervisor.current_connection().expect("handle");
    let started = Instant::now();

    // Act
    supervisor
        .outbound()
        .broadcast(MessageContainer::text("stuck"))
        .await;

    // Assert – the producer got its task back after the write deadline
    assert!(started.elapsed() >= config.write_timeout);
    assert!(started.elapsed() < config.heartbeat.ping_period());
    assert!(handle.is_closed());
    assert_eq!(supervisor.connectivity(), ConnectivityState::Disconnected);
}

#[tokio::test]
async fn test_failed_write_closes_link_and_next_broadcast_is_dropped() {
    let (connector, mut peers) = MockConnector::new();
    let (supervisor, _log) = supervisor_with_log(connector);
    supervisor.dial().await;
    let peer = next_peer(&mut peers).await;
    peer.set_fail_writes(true);
    let hub = supervisor.outbound();

    hub.broadcast(MessageContainer::text("fails")).await;
    hub.broadcast(MessageContainer::text("dropped")).await;

    assert_eq!(supervisor.connectivity(), ConnectivityState::Disconnected);
    assert_eq!(hub.dropped_count(), 1);
    assert_eq!(hub.current_generation(), None);
}
