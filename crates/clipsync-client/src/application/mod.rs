//! Application layer use cases for the client application.
//!
//! - **`inbound`** – The [`inbound::InboundHandler`] port: what the reader
//!   pump calls with every data payload the relay sends.
//!
//! - **`clipboard_sync`** – Applies remote clipboard text locally and
//!   publishes local clipboard changes, suppressing the echo of a value that
//!   just arrived from the relay.  The clipboard itself is reached through a
//!   [`clipboard_sync::ClipboardBackend`] injected at construction time.
//!
//! Nothing here knows about WebSockets; outbound messages leave through the
//! [`clipboard_sync::OutboundSink`] port.

pub mod clipboard_sync;
pub mod inbound;
