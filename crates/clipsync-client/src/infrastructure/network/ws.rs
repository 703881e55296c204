//! WebSocket transport over tokio-tungstenite.
//!
//! The upgrade request carries the device identity as two extra headers
//! (`SystemName`, `DeviceName`).  After the handshake the stream is split so
//! the reader pump and the writer listener never contend for one lock.

use async_trait::async_trait;
use clipsync_core::{EndpointIdentity, MessageContainer, MessageKind};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use super::transport::{Connector, FramePair, FrameReader, FrameWriter};
use super::ClientNetworkError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials the relay with `connect_async`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

/// Builds the upgrade request for `identity`, including the identity headers.
///
/// # Errors
///
/// [`ClientNetworkError::InvalidRequest`] if the URL cannot be parsed or a
/// header value contains characters HTTP does not allow.
pub fn build_request(identity: &EndpointIdentity) -> Result<Request, ClientNetworkError> {
    let mut request = identity
        .server_url
        .as_str()
        .into_client_request()
        .map_err(|e| ClientNetworkError::InvalidRequest(format!("{}: {e}", identity.server_url)))?;

    for (name, value) in identity.handshake_headers() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ClientNetworkError::InvalidRequest(format!("header {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ClientNetworkError::InvalidRequest(format!("header {name}: {e}")))?;
        request.headers_mut().insert(name, value);
    }
    Ok(request)
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, identity: &EndpointIdentity) -> Result<FramePair, ClientNetworkError> {
        let request = build_request(identity)?;
        let (stream, response) =
            connect_async(request)
                .await
                .map_err(|e| ClientNetworkError::ConnectFailed {
                    url: identity.server_url.clone(),
                    reason: e.to_string(),
                })?;
        debug!(
            server_url = %identity.server_url,
            status = %response.status(),
            "websocket handshake complete"
        );

        let (sink, stream) = stream.split();
        Ok((
            Box::new(WsFrameReader { stream }),
            Box::new(WsFrameWriter { sink }),
        ))
    }
}

// ── Frame conversion ──────────────────────────────────────────────────────────

fn to_ws(frame: MessageContainer) -> WsMessage {
    let kind = frame.kind();
    let payload = frame.into_payload();
    match kind {
        MessageKind::Text => match String::from_utf8(payload) {
            Ok(text) => WsMessage::Text(text),
            // Not valid UTF-8: send the bytes unchanged rather than mangle them.
            Err(e) => WsMessage::Binary(e.into_bytes()),
        },
        MessageKind::Binary => WsMessage::Binary(payload),
        MessageKind::Ping => WsMessage::Ping(payload),
        MessageKind::Pong => WsMessage::Pong(payload),
        MessageKind::Close => WsMessage::Close(None),
    }
}

/// `None` for raw frames, which only appear when writing.
fn from_ws(message: WsMessage) -> Option<MessageContainer> {
    match message {
        WsMessage::Text(text) => Some(MessageContainer::text(text)),
        WsMessage::Binary(data) => Some(MessageContainer::binary(data)),
        WsMessage::Ping(data) => Some(MessageContainer::new(MessageKind::Ping, data)),
        WsMessage::Pong(data) => Some(MessageContainer::new(MessageKind::Pong, data)),
        WsMessage::Close(_) => Some(MessageContainer::close()),
        WsMessage::Frame(_) => None,
    }
}

// ── Reader / writer halves ────────────────────────────────────────────────────

struct WsFrameReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl FrameReader for WsFrameReader {
    async fn read_frame(&mut self) -> Result<Option<MessageContainer>, ClientNetworkError> {
        loop {
            match self.stream.next().await {
                None => return Ok(None),
                Some(Ok(message)) => match from_ws(message) {
                    Some(frame) => return Ok(Some(frame)),
                    None => trace!("skipping raw websocket frame"),
                },
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => return Ok(None),
                Some(Err(e)) => return Err(ClientNetworkError::Transport(e.to_string())),
            }
        }
    }
}

struct WsFrameWriter {
    sink: SplitSink<WsStream, WsMessage>,
}

#[async_trait]
impl FrameWriter for WsFrameWriter {
    async fn write_frame(&mut self, frame: MessageContainer) -> Result<(), ClientNetworkError> {
        self.sink
            .send(to_ws(frame))
            .await
            .map_err(|e| ClientNetworkError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ClientNetworkError> {
        match self.sink.close().await {
            Ok(()) | Err(WsError::ConnectionClosed) => Ok(()),
            Err(e) => Err(ClientNetworkError::Transport(e.to_string())),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
