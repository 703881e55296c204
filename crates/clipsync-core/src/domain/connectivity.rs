//! Connectivity state shown to status observers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether the client currently has a usable connection to the relay.
///
/// The network layer publishes every transition; observers such as a tray
/// icon only ever need the latest value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectivityState {
    /// No live connection.  The reconnect loop will dial on its next tick.
    #[default]
    Disconnected,
    /// A dial is in flight.
    Connecting,
    /// A connection is live and both pumps are running.
    Connected,
}

impl ConnectivityState {
    pub fn is_connected(self) -> bool {
        self == ConnectivityState::Connected
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectivityState::Disconnected => "disconnected",
            ConnectivityState::Connecting => "connecting",
            ConnectivityState::Connected => "connected",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_disconnected() {
        assert_eq!(ConnectivityState::default(), ConnectivityState::Disconnected);
    }

    #[test]
    fn test_only_connected_reports_is_connected() {
        assert!(ConnectivityState::Connected.is_connected());
        assert!(!ConnectivityState::Connecting.is_connected());
        assert!(!ConnectivityState::Disconnected.is_connected());
    }

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(ConnectivityState::Connecting.to_string(), "connecting");
    }
}
