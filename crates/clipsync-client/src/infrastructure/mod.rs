//! Infrastructure layer for the client application.
//!
//! Contains the adapters the use cases are wired to: the relay connection,
//! the clipboard backend, configuration storage, and the status bridge.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `clipsync_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`network`** – WebSocket link to the relay: dialing, the read/write
//!   pumps, heartbeats, outbound fan-out, and the reconnect loop.
//!
//! - **`clipboard`** – `ClipboardBackend` implementations.  Currently the
//!   in-process [`clipboard::MemoryClipboard`].
//!
//! - **`storage`** – TOML configuration on disk.
//!
//! - **`ui_bridge`** – Connection status and commands for a tray or settings
//!   window.

pub mod clipboard;
pub mod network;
pub mod storage;
pub mod ui_bridge;
