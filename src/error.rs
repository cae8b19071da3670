//! Error taxonomy for the session client.
//!
//! One enum covers every failure a caller can observe. Remote and HTTP
//! context is carried as strings; socket failures keep the underlying
//! [`TransportError`] so callers can tell a closed stream from an I/O error.

use crate::session::SessionState;
use crate::transport::TransportError;

/// Errors produced by handshake, upgrade and session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    Config(String),

    /// The polling handshake failed: transport error, bad status, or an
    /// unexpected or malformed body.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The websocket dial was refused or the probe exchange never completed.
    #[error("upgrade failed: {0}")]
    Upgrade(String),

    /// Writing a frame to the socket failed.
    #[error("send failed: {0}")]
    Send(#[source] TransportError),

    /// Reading a frame from the socket failed.
    #[error("read failed: {0}")]
    Read(#[source] TransportError),

    /// A frame or its nested payload could not be decoded.
    #[error("decode failed: {0}")]
    Decode(#[from] frames::CodecError),

    /// A frame other than progress, heartbeat or answer arrived while
    /// awaiting an answer.
    #[error("no answer: {0}")]
    NoAnswer(String),

    /// The session was explicitly closed.
    #[error("session closed")]
    Closed,

    /// The operation is not valid in the session's current state.
    #[error("{op} is not valid while the session is {state:?}")]
    InvalidState { op: &'static str, state: SessionState },
}

impl SessionError {
    /// Grepable code for logs and CLI output.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "E_CONFIG",
            Self::Handshake(_) => "E_HANDSHAKE",
            Self::Upgrade(_) => "E_UPGRADE",
            Self::Send(_) => "E_SEND",
            Self::Read(_) => "E_READ",
            Self::Decode(_) => "E_DECODE",
            Self::NoAnswer(_) => "E_NO_ANSWER",
            Self::Closed => "E_CLOSED",
            Self::InvalidState { .. } => "E_INVALID_STATE",
        }
    }

    /// `true` when the session is probably unusable and the caller should
    /// close it and handshake again.
    #[must_use]
    pub fn requires_reconnect(&self) -> bool {
        matches!(
            self,
            Self::Upgrade(_) | Self::Send(_) | Self::Read(_) | Self::Closed
        )
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(frames::CodecError::InvalidJson(err))
    }
}
