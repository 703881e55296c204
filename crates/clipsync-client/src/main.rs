//! ClipSync client entry point.
//!
//! Wires the clipboard use case to the relay connection, then runs until
//! Ctrl-C.
//!
//! ```text
//! main()
//!  └─ load_or_create_config()        -- ./clipsync.toml unless --config
//!  └─ ConnectionSupervisor::start()  -- first dial + reconnect loop
//!  └─ ClipboardSync::watch_local()   -- local changes -> relay
//!  └─ follow_status()                -- status channel -> ClientAppState
//! ```
//!
//! The clipboard backend is the in-memory `MemoryClipboard` until a platform
//! backend is wired in.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use clipsync_client::application::clipboard_sync::ClipboardSync;
use clipsync_client::application::inbound::InboundHandler;
use clipsync_client::infrastructure::{
    clipboard::MemoryClipboard,
    network::{ConnectionSupervisor, WsConnector},
    storage::config::{load_or_create_config, DEFAULT_CONFIG_FILE},
    ui_bridge::{follow_status, ClientAppState},
};

/// ClipSync device client.
#[derive(Debug, Parser)]
#[command(
    name = "clipsync-client",
    about = "Keeps the clipboard in sync with other devices through a relay",
    version
)]
struct Cli {
    /// Path of the TOML config file.  Created with defaults if missing.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, env = "CLIPSYNC_CONFIG")]
    config: PathBuf,

    /// Overrides `client.server_url` from the config file.
    #[arg(long, env = "CLIPSYNC_SERVER_URL")]
    server_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_or_create_config(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(url) = cli.server_url {
        config.client.server_url = url;
    }
    config.validate().context("config rejected")?;

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.client.log_level)),
        )
        .init();

    let identity = config.endpoint_identity();
    info!(
        config = %cli.config.display(),
        server_url = %identity.server_url,
        device_name = %identity.device_name,
        system_name = %identity.system_name,
        "ClipSync client starting"
    );

    let shutdown = CancellationToken::new();
    let app_state = ClientAppState::new(
        identity.server_url.clone(),
        identity.device_name.clone(),
    );

    // ── Use case + supervisor ─────────────────────────────────────────────────
    let clipboard = Arc::new(MemoryClipboard::new());
    let sync = Arc::new(ClipboardSync::new(clipboard));
    let inbound: Arc<dyn InboundHandler> = sync.clone();
    let supervisor = ConnectionSupervisor::new(
        identity,
        config.connection_config(),
        Arc::new(WsConnector::new()),
        inbound,
    );

    tokio::spawn(follow_status(
        Arc::clone(&app_state),
        supervisor.subscribe_status(),
        shutdown.clone(),
    ));

    let Some(reconnect_loop) = supervisor.start(shutdown.clone()).await else {
        anyhow::bail!("connection supervisor failed to start");
    };

    let watcher = tokio::spawn(Arc::clone(&sync).watch_local(
        supervisor.outbound(),
        config.clipboard_poll_interval(),
        shutdown.clone(),
    ));

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let ctrl_c_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => warn!("could not listen for Ctrl-C: {e}"),
        }
        ctrl_c_token.cancel();
    });

    reconnect_loop.await.context("reconnect loop panicked")?;
    watcher.await.context("clipboard watcher panicked")?;
    info!(
        dropped = supervisor.outbound().dropped_count(),
        "ClipSync client stopped"
    );
    Ok(())
}
