//! TOML-based configuration for the client.
//!
//! The file lives at `./clipsync.toml` unless `--config` (or
//! `CLIPSYNC_CONFIG`) points elsewhere:
//!
//! ```toml
//! [client]
//! server_url  = "ws://localhost:8090/ws"
//! device_name = "desk-01"
//! system_name = "linux"
//! secret_key  = "3f0c9d1e..."
//! log_level   = "info"
//! clipboard_poll_ms = 500
//!
//! [network]
//! reconnect_period_secs  = 5
//! connect_timeout_secs   = 45
//! heartbeat_timeout_secs = 30
//! write_timeout_secs     = 10
//! ```
//!
//! On first run the file does not exist; [`load_or_create_config`] fills in
//! the hostname, the OS name and a fresh secret key, writes the file, and
//! returns the result.  Fields missing from an existing file fall back to
//! their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clipsync_core::EndpointIdentity;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::infrastructure::network::{ClientConnectionConfig, HeartbeatConfig};

/// Default file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "clipsync.toml";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// The file parsed but a value is unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub network: NetworkSection,
}

/// Identity and general behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSection {
    /// WebSocket URL of the relay.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Sent to the relay as the `DeviceName` header.
    #[serde(default = "hostname")]
    pub device_name: String,
    /// Sent to the relay as the `SystemName` header.
    #[serde(default = "default_system_name")]
    pub system_name: String,
    /// Shared secret for payload encryption.  Generated on first run; not yet
    /// applied to payloads.
    #[serde(default)]
    pub secret_key: String,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// How often the local clipboard is polled for changes.
    #[serde(default = "default_clipboard_poll_ms")]
    pub clipboard_poll_ms: u64,
}

/// Connection timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    #[serde(default = "default_reconnect_period_secs")]
    pub reconnect_period_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_server_url() -> String {
    "ws://localhost:8090/ws".to_string()
}

fn default_system_name() -> String {
    std::env::consts::OS.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_clipboard_poll_ms() -> u64 {
    500
}

fn default_reconnect_period_secs() -> u64 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    45
}

fn default_heartbeat_timeout_secs() -> u64 {
    30
}

fn default_write_timeout_secs() -> u64 {
    10
}

/// Device name used when the OS will not report a hostname.
const FALLBACK_DEVICE_NAME: &str = "clipsync-device";

/// Returns the machine's hostname as reported by the OS, or a fallback.
pub fn hostname() -> String {
    ::hostname::get()
        .ok()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_DEVICE_NAME.to_string())
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            device_name: hostname(),
            system_name: default_system_name(),
            secret_key: String::new(),
            log_level: default_log_level(),
            clipboard_poll_ms: default_clipboard_poll_ms(),
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            reconnect_period_secs: default_reconnect_period_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Defaults plus a freshly generated secret key, as written on first run.
    pub fn generate() -> Self {
        let mut cfg = Self::default();
        cfg.client.secret_key = Uuid::new_v4().simple().to_string();
        cfg
    }

    /// Rejects values the client cannot run with.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.client.server_url.trim();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::Invalid(format!(
                "client.server_url must be a ws:// or wss:// URL, got {url:?}"
            )));
        }
        if self.client.device_name.trim().is_empty() {
            return Err(ConfigError::Invalid("client.device_name is empty".into()));
        }
        if self.client.clipboard_poll_ms == 0 {
            return Err(ConfigError::Invalid("client.clipboard_poll_ms must be > 0".into()));
        }
        let net = &self.network;
        for (name, value) in [
            ("reconnect_period_secs", net.reconnect_period_secs),
            ("connect_timeout_secs", net.connect_timeout_secs),
            ("heartbeat_timeout_secs", net.heartbeat_timeout_secs),
            ("write_timeout_secs", net.write_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("network.{name} must be > 0")));
            }
        }
        Ok(())
    }

    /// The identity presented to the relay.
    pub fn endpoint_identity(&self) -> EndpointIdentity {
        EndpointIdentity::new(
            self.client.server_url.trim(),
            self.client.system_name.clone(),
            self.client.device_name.clone(),
        )
    }

    /// Timing for the connection supervisor.
    pub fn connection_config(&self) -> ClientConnectionConfig {
        ClientConnectionConfig {
            reconnect_period: Duration::from_secs(self.network.reconnect_period_secs),
            connect_timeout: Duration::from_secs(self.network.connect_timeout_secs),
            heartbeat: HeartbeatConfig::new(Duration::from_secs(
                self.network.heartbeat_timeout_secs,
            )),
            write_timeout: Duration::from_secs(self.network.write_timeout_secs),
        }
    }

    pub fn clipboard_poll_interval(&self) -> Duration {
        Duration::from_millis(self.client.clipboard_poll_ms)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `ClientConfig` from `path`.
///
/// # Errors
///
/// [`ConfigError::Io`] for any file-system error (including "not found") and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Loads `ClientConfig` from `path`, creating the file with generated
/// defaults when it does not exist yet.
///
/// # Errors
///
/// [`ConfigError::Io`] for file-system errors other than "not found", and
/// [`ConfigError::Parse`] if an existing file is malformed.
pub fn load_or_create_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "config file not found; creating one with defaults");
            let cfg = ClientConfig::generate();
            save_config(path, &cfg)?;
            Ok(cfg)
        }
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
