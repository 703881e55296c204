//! Transport seams between the connection supervisor and the wire.
//!
//! A [`Connector`] dials the relay and hands back the two halves of one live
//! connection.  The halves are separate objects so the reader pump and the
//! writer can run on different tasks without contending for a lock.

use async_trait::async_trait;
use clipsync_core::{EndpointIdentity, MessageContainer};

use super::ClientNetworkError;

/// The read half of a live connection.
#[async_trait]
pub trait FrameReader: Send {
    /// Waits for the next frame.
    ///
    /// Returns `Ok(None)` once the peer has ended the stream.
    async fn read_frame(&mut self) -> Result<Option<MessageContainer>, ClientNetworkError>;
}

/// The write half of a live connection.
#[async_trait]
pub trait FrameWriter: Send {
    /// Sends one frame.
    async fn write_frame(&mut self, frame: MessageContainer) -> Result<(), ClientNetworkError>;

    /// Sends a close frame and releases the underlying transport.
    async fn close(&mut self) -> Result<(), ClientNetworkError>;
}

/// Both halves of a freshly dialed connection.
pub type FramePair = (Box<dyn FrameReader>, Box<dyn FrameWriter>);

/// Dials the relay server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a connection presenting `identity` in the handshake.
    async fn connect(&self, identity: &EndpointIdentity) -> Result<FramePair, ClientNetworkError>;
}
