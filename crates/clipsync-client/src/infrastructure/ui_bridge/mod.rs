//! Status bridge between the client and a presentation layer.
//!
//! A tray icon or settings window never touches the network layer directly.
//! It reads [`ClientAppState`] through the command functions below and asks
//! for a disconnect through [`request_disconnect`].  [`follow_status`] keeps
//! the state in step with the supervisor's status channel.
//!
//! # DTOs
//!
//! `ClientAppState` holds `tokio::sync::Mutex`es and is not serializable.
//! `ClientStatusDto` and `ClientSettingsDto` are plain snapshots that can
//! cross an IPC boundary.  Every command returns `ClientCommandResult<T>`:
//!
//! ```json
//! { "success": true,  "data": {...}, "error": null  }
//! { "success": false, "data": null,  "error": "..."  }
//! ```

use std::sync::Arc;

use clipsync_core::ConnectivityState;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::infrastructure::network::CloseHandle;

// ── Shared application state ──────────────────────────────────────────────────

/// Runtime state shared between presentation commands.
pub struct ClientAppState {
    /// Latest value seen on the status channel.
    pub connectivity: Mutex<ConnectivityState>,
    /// Number of status changes observed since startup.
    pub status_changes: Mutex<u64>,
    pub server_url: Mutex<String>,
    pub device_name: Mutex<String>,
}

impl ClientAppState {
    pub fn new(server_url: impl Into<String>, device_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            connectivity: Mutex::new(ConnectivityState::Disconnected),
            status_changes: Mutex::new(0),
            server_url: Mutex::new(server_url.into()),
            device_name: Mutex::new(device_name.into()),
        })
    }
}

// ── DTOs ──────────────────────────────────────────────────────────────────────

/// Status snapshot for the presentation layer.
///
/// `connection_status` is the lowercase state name: `"disconnected"`,
/// `"connecting"` or `"connected"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientStatusDto {
    pub connection_status: String,
    pub server_url: String,
    pub device_name: String,
    pub status_changes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettingsDto {
    pub server_url: String,
    pub device_name: String,
}

/// Unified response wrapper for client commands.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClientCommandResult<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ClientCommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

// ── Status follower ───────────────────────────────────────────────────────────

/// Mirrors the status channel into `state` until `shutdown` is cancelled or
/// the channel closes.
///
/// Only the latest value matters; intermediate states a slow follower misses
/// are simply skipped.
pub async fn follow_status(
    state: Arc<ClientAppState>,
    mut rx: watch::Receiver<ConnectivityState>,
    shutdown: CancellationToken,
) {
    loop {
        let current = *rx.borrow_and_update();
        {
            let mut connectivity = state.connectivity.lock().await;
            if *connectivity != current {
                *connectivity = current;
                *state.status_changes.lock().await += 1;
                debug!(state = %current, "status bridge updated");
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            changed = rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn get_client_status(state: Arc<ClientAppState>) -> ClientCommandResult<ClientStatusDto> {
    let connectivity = *state.connectivity.lock().await;
    let changes = *state.status_changes.lock().await;
    let server_url = state.server_url.lock().await.clone();
    let device_name = state.device_name.lock().await.clone();

    ClientCommandResult::ok(ClientStatusDto {
        connection_status: connectivity.to_string(),
        server_url,
        device_name,
        status_changes: changes,
    })
}

pub async fn get_client_settings(
    state: Arc<ClientAppState>,
) -> ClientCommandResult<ClientSettingsDto> {
    let server_url = state.server_url.lock().await.clone();
    let device_name = state.device_name.lock().await.clone();

    ClientCommandResult::ok(ClientSettingsDto {
        server_url,
        device_name,
    })
}

/// Applies new settings to the displayed state.
///
/// The running connection keeps the identity it was started with; new values
/// take effect after a restart.
pub async fn update_client_settings(
    state: Arc<ClientAppState>,
    settings: ClientSettingsDto,
) -> ClientCommandResult<()> {
    if settings.device_name.trim().is_empty() {
        return ClientCommandResult::err("device_name must not be empty");
    }
    let url = settings.server_url.trim();
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        return ClientCommandResult::err("server_url must start with ws:// or wss://");
    }

    *state.server_url.lock().await = url.to_string();
    *state.device_name.lock().await = settings.device_name;
    ClientCommandResult::ok(())
}

/// Asks the supervisor to drop the current connection.  The reconnect loop
/// dials again on its next tick.
pub fn request_disconnect(close: &CloseHandle) -> ClientCommandResult<()> {
    if close.request_close() {
        ClientCommandResult::ok(())
    } else {
        ClientCommandResult::err("client is not running")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
