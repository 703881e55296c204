//! The inbound side of the network seam.
//!
//! The reader pump hands every data payload it receives to an
//! [`InboundHandler`].  The handler decides whether the pump keeps going.

/// Consumer of payloads received from the relay.
///
/// Implementations must tolerate seeing the same payload twice: nothing
/// de-duplicates deliveries around a reconnect.
pub trait InboundHandler: Send + Sync {
    /// Applies one payload.  Returning `false` stops the reader pump and
    /// closes the connection.
    fn handle(&self, payload: &[u8]) -> bool;
}

impl<F> InboundHandler for F
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    fn handle(&self, payload: &[u8]) -> bool {
        self(payload)
    }
}
