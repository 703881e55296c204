//! clipsync-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! The client keeps one WebSocket connection to the relay alive for as long
//! as the process runs:
//!
//! 1. Dials the relay, presenting its `SystemName` and `DeviceName`.
//! 2. Hands every inbound text or binary payload to the clipboard use case.
//! 3. Broadcasts local clipboard changes to the relay.
//! 4. Pings the relay and drops the link if nothing comes back in time.
//! 5. Redials every few seconds while disconnected.

/// Application layer: use cases and the ports they depend on.
pub mod application;

/// Infrastructure layer: network, clipboard, config storage, status bridge.
pub mod infrastructure;
