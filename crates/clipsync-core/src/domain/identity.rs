//! The identity a device presents to the relay server.
//!
//! Built once from configuration before the connection supervisor starts and
//! never modified afterwards; the network layer shares it behind an `Arc`.

use serde::{Deserialize, Serialize};

use crate::protocol::messages::{DEVICE_NAME_HEADER, SYSTEM_NAME_HEADER};

/// Server address plus the device identity headers sent at dial time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointIdentity {
    /// WebSocket URL of the relay, e.g. `ws://localhost:8090/ws`.
    pub server_url: String,
    /// Operating-system name (`linux`, `windows`, `macos`, …).
    pub system_name: String,
    /// Human-readable device name, usually the hostname.
    pub device_name: String,
}

impl EndpointIdentity {
    pub fn new(
        server_url: impl Into<String>,
        system_name: impl Into<String>,
        device_name: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            system_name: system_name.into(),
            device_name: device_name.into(),
        }
    }

    /// The `(name, value)` header pairs sent with the upgrade request.
    pub fn handshake_headers(&self) -> [(&'static str, &str); 2] {
        [
            (SYSTEM_NAME_HEADER, self.system_name.as_str()),
            (DEVICE_NAME_HEADER, self.device_name.as_str()),
        ]
    }
}
