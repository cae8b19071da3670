//! Socket seam between the session engine and the websocket.
//!
//! The engine and the probe exchange only ever see text frames through
//! [`FrameSocket`]. [`WsSocket`] is the production implementation over
//! tokio-tungstenite; tests substitute a scripted in-memory socket.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Failure reading from or writing to a frame socket.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The remote closed the stream, or it was already closed locally.
    #[error("socket closed")]
    Closed,
    /// Any other websocket protocol or I/O failure.
    #[error("websocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => Self::Closed,
            other => Self::WebSocket(Box::new(other)),
        }
    }
}

/// A bidirectional stream of complete text frames.
#[async_trait::async_trait]
pub trait FrameSocket: Send {
    /// Write one text frame.
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Wait for the next text frame. Blocks until one arrives or the socket fails.
    async fn recv_text(&mut self) -> Result<String, TransportError>;

    /// Send a close frame and release the socket.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Websocket connection as returned by `connect_async`.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`FrameSocket`] over a tokio-tungstenite stream.
pub struct WsSocket {
    stream: WsStream,
}

impl WsSocket {
    #[must_use]
    pub fn new(stream: WsStream) -> Self {
        Self { stream }
    }
}

#[async_trait::async_trait]
impl FrameSocket for WsSocket {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<String, TransportError> {
        loop {
            let Some(msg) = self.stream.next().await else {
                return Err(TransportError::Closed);
            };
            match msg? {
                Message::Text(text) => return Ok(text.as_str().to_owned()),
                Message::Close(_) => return Err(TransportError::Closed),
                Message::Binary(bytes) => {
                    tracing::debug!(len = bytes.len(), "ignoring binary websocket message");
                }
                // tungstenite answers websocket-level pings itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(err) => match TransportError::from(err) {
                TransportError::Closed => Ok(()),
                other => Err(other),
            },
        }
    }
}
