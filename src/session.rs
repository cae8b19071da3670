//! Session engine: one logical conversation over one socket.
//!
//! ```text
//! New ──handshake──▶ HandshakeDone ──upgrade──▶ Upgraded ──▶ Ready ⇄ AwaitingAnswer
//!                                                                 │
//!                                 any state ──close──▶ Closed ◀───┘
//! ```
//!
//! All mutable state (sequence number, continuation token, correlation id)
//! lives in the [`Session`] value. Every operation takes `&mut self`, so one
//! session is serialized by the borrow checker; open more sessions for
//! concurrent questions.

use frames::{EventKind, Frame};

use crate::config::{ClientConfig, parse_endpoint};
use crate::cookies::SessionCookies;
use crate::error::SessionError;
use crate::handshake::HandshakeClient;
use crate::identity::Identity;
use crate::transport::{FrameSocket, WsSocket};
use crate::types::{AnswerDetails, AnswerEnvelope, AskRequest, SearchSource, SessionDescriptor};
use crate::upgrade::{UpgradeClient, probe};

/// First sequence number used for an ask.
const FIRST_SEQUENCE: u64 = 1;

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    New,
    HandshakeDone,
    /// Probe finished; passed through on the way to `Ready`.
    Upgraded,
    Ready,
    AwaitingAnswer,
    Closed,
}

/// A session against the remote, generic over the socket so the engine can
/// run on a scripted socket in tests.
pub struct Session<S: FrameSocket = WsSocket> {
    config: ClientConfig,
    identity: Identity,
    handshake: HandshakeClient,
    upgrader: UpgradeClient,
    state: SessionState,
    descriptor: Option<SessionDescriptor>,
    socket: Option<S>,
    seq: u64,
    last_backend_uuid: String,
    read_write_token: String,
}

impl Session<WsSocket> {
    /// Handshake and upgrade a fresh session with a random identity.
    ///
    /// # Errors
    ///
    /// Returns the first [`SessionError`] from construction, handshake or
    /// upgrade.
    pub async fn connect(config: ClientConfig) -> Result<Self, SessionError> {
        let mut session = Self::new(config, Identity::generate())?;
        session.handshake().await?;
        session.upgrade().await?;
        Ok(session)
    }

    /// Dial the websocket for the negotiated sid and run the probe.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the handshake is done,
    /// and [`SessionError::Upgrade`] if the dial or probe fails. The session
    /// stays in `HandshakeDone` on failure.
    pub async fn upgrade(&mut self) -> Result<(), SessionError> {
        self.require_state("upgrade", &[SessionState::HandshakeDone])?;
        let sid = self.sid_for("upgrade")?.to_owned();
        let socket = self.upgrader.connect(&sid).await?;
        self.upgrade_with(socket).await
    }
}

impl<S: FrameSocket> Session<S> {
    /// Build a session in state `New`. No network traffic happens here.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for an invalid endpoint or identity.
    pub fn new(config: ClientConfig, identity: Identity) -> Result<Self, SessionError> {
        let endpoint = parse_endpoint(&config.endpoint)?;
        let cookies = SessionCookies::new();
        let handshake = HandshakeClient::new(endpoint.clone(), &cookies, &identity, &config.timeouts)?;
        let upgrader = UpgradeClient::new(endpoint, cookies, identity.user_agent.clone(), config.timeouts.probe);

        Ok(Self {
            config,
            identity,
            handshake,
            upgrader,
            state: SessionState::New,
            descriptor: None,
            socket: None,
            seq: FIRST_SEQUENCE,
            last_backend_uuid: String::new(),
            read_write_token: String::new(),
        })
    }

    /// Build a session whose polling handshake already happened, in state
    /// `HandshakeDone`.
    ///
    /// # Errors
    ///
    /// Same as [`Session::new`].
    pub fn from_descriptor(
        config: ClientConfig,
        identity: Identity,
        descriptor: SessionDescriptor,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(config, identity)?;
        session.descriptor = Some(descriptor);
        session.state = SessionState::HandshakeDone;
        Ok(session)
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Negotiate a sid, then confirm and verify it over polling.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Handshake`] if any of the three requests fails;
    /// the session stays `New`.
    pub async fn handshake(&mut self) -> Result<(), SessionError> {
        self.require_state("handshake", &[SessionState::New])?;

        let descriptor = self.handshake.negotiate().await?;
        self.handshake.confirm_live(&descriptor.sid).await?;
        self.handshake.verify_session(&descriptor.sid).await?;

        tracing::info!(sid = %descriptor.sid, "handshake complete");
        self.descriptor = Some(descriptor);
        self.state = SessionState::HandshakeDone;
        Ok(())
    }

    /// Run the probe over `socket` and adopt it as the session socket.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] unless the handshake is done,
    /// and [`SessionError::Upgrade`] if the probe fails.
    pub async fn upgrade_with(&mut self, mut socket: S) -> Result<(), SessionError> {
        self.require_state("upgrade", &[SessionState::HandshakeDone])?;
        probe(&mut socket, self.config.timeouts.probe).await?;

        self.socket = Some(socket);
        self.state = SessionState::Upgraded;
        tracing::info!(sid = self.session_id().unwrap_or_default(), "websocket upgraded");
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Send a close frame and release the socket.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if already closed, or
    /// [`SessionError::Send`] if the close frame could not be written. The
    /// session is `Closed` either way.
    pub async fn close(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }
        self.state = SessionState::Closed;
        tracing::info!(sid = self.session_id().unwrap_or_default(), "session closed");

        match self.socket.take() {
            Some(mut socket) => socket.close().await.map_err(SessionError::Send),
            None => Ok(()),
        }
    }

    // =========================================================================
    // ASK / ANSWER
    // =========================================================================

    /// Send `question` and return the sequence number it was framed with.
    ///
    /// Follow-up asks carry the correlation id and continuation token from
    /// the last answer. Asking again before reading is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Send`] if the write fails; the sequence number
    /// and state are unchanged in that case.
    pub async fn ask(&mut self, question: &str) -> Result<u64, SessionError> {
        self.require_state("ask", &[SessionState::Ready, SessionState::AwaitingAnswer])?;

        let seq = self.seq;
        let frame = frames::encode_ask(seq, question, &self.ask_request())?;
        self.socket_for("ask")?
            .send_text(&frame)
            .await
            .map_err(SessionError::Send)?;

        self.seq += 1;
        self.state = SessionState::AwaitingAnswer;
        tracing::debug!(seq, "ask sent");
        Ok(seq)
    }

    /// Read frames until the answer for the outstanding ask arrives.
    ///
    /// Progress frames are skipped and heartbeat pings answered. After the
    /// answer one trailing frame is drained.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NoAnswer`] for any other frame, or when the frame
    ///   ceiling is reached; the session stays `AwaitingAnswer`.
    /// - [`SessionError::Read`] if the socket fails.
    /// - [`SessionError::Decode`] if the answer payload is malformed.
    pub async fn read_answer(&mut self) -> Result<AnswerDetails, SessionError> {
        self.require_state("read_answer", &[SessionState::AwaitingAnswer])?;

        let limit = self.config.max_frames_per_answer;
        let envelope = await_answered(self.socket_for("read_answer")?, limit).await?;

        self.last_backend_uuid = envelope.backend_uuid;
        if let Some(token) = envelope.read_write_token {
            self.read_write_token = token;
        }
        let details: AnswerDetails = serde_json::from_str(&envelope.text)?;

        self.drain_trailing_frame().await;
        self.state = SessionState::Ready;
        Ok(details)
    }

    fn ask_request(&self) -> AskRequest {
        let ask = &self.config.ask;
        let android_device_id = match ask.source {
            SearchSource::Android => self.identity.device_id.clone(),
            SearchSource::Default => String::new(),
        };
        AskRequest {
            source: ask.source,
            version: String::new(),
            token: self.identity.token.clone(),
            frontend_uuid: self.identity.frontend_uuid.to_string(),
            frontend_session_id: self.identity.frontend_session_id.to_string(),
            last_backend_uuid: self.last_backend_uuid.clone(),
            use_inhouse_model: false,
            read_write_token: self.read_write_token.clone(),
            conversational_enabled: true,
            android_device_id,
            language: ask.language.clone(),
            timezone: ask.timezone.clone(),
            search_focus: ask.search_focus,
            gpt4: false,
            mode: ask.mode,
        }
    }

    async fn drain_trailing_frame(&mut self) {
        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        match socket.recv_text().await {
            Ok(text) if matches!(frames::decode(&text), Frame::Ping) => {
                if let Err(err) = socket.send_text(frames::PONG).await {
                    tracing::warn!(error = %err, "pong for drained ping failed");
                }
            }
            Ok(text) => tracing::debug!(frame = %text, "drained trailing frame"),
            Err(err) => tracing::warn!(error = %err, "trailing frame read failed"),
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Negotiated sid, once the handshake is done.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.descriptor.as_ref().map(|d| d.sid.as_str())
    }

    #[must_use]
    pub fn descriptor(&self) -> Option<&SessionDescriptor> {
        self.descriptor.as_ref()
    }

    /// Sequence number the next ask will use.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.seq
    }

    /// Correlation id from the last answer; empty before the first.
    #[must_use]
    pub fn last_backend_uuid(&self) -> &str {
        &self.last_backend_uuid
    }

    /// Continuation token from the last answer; empty before the first.
    #[must_use]
    pub fn read_write_token(&self) -> &str {
        &self.read_write_token
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    fn require_state(&self, op: &'static str, allowed: &[SessionState]) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState { op, state: self.state })
        }
    }

    fn sid_for(&self, op: &'static str) -> Result<&str, SessionError> {
        self.session_id()
            .ok_or(SessionError::InvalidState { op, state: self.state })
    }

    fn socket_for(&mut self, op: &'static str) -> Result<&mut S, SessionError> {
        let state = self.state;
        self.socket
            .as_mut()
            .ok_or(SessionError::InvalidState { op, state })
    }
}

/// Read until a `query_answered` event, skipping progress and answering
/// pings, for at most `limit` frames.
async fn await_answered<S: FrameSocket>(socket: &mut S, limit: usize) -> Result<AnswerEnvelope, SessionError> {
    for _ in 0..limit {
        let text = socket.recv_text().await.map_err(SessionError::Read)?;
        match frames::decode(&text) {
            Frame::Ping => {
                tracing::debug!("heartbeat ping");
                socket.send_text(frames::PONG).await.map_err(SessionError::Send)?;
            }
            Frame::Event(event) if event.kind() == EventKind::Progress => {
                tracing::debug!(len = text.len(), "query progress");
            }
            Frame::Event(event) if event.kind() == EventKind::Answered => {
                return Ok(event.arg(0)?);
            }
            _ => {
                return Err(SessionError::NoAnswer(format!("unexpected frame while awaiting answer: {text:?}")));
            }
        }
    }
    Err(SessionError::NoAnswer(format!("no answer within {limit} frames")))
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
