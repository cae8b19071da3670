//! Websocket upgrade and probe exchange.
//!
//! After the polling handshake the session is promoted to a websocket on the
//! same endpoint (`transport=websocket&sid=<sid>`). The socket is not usable
//! until the probe completes:
//!
//! ```text
//! client: 2probe
//! remote: 3probe      client: 5
//! remote: 6           (done)
//! ```
//!
//! A heartbeat ping (`2`) can arrive mid-probe and is answered with `3`.

use std::time::Duration;

use reqwest::Url;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, header};

use crate::cookies::SessionCookies;
use crate::error::SessionError;
use crate::handshake::transport_url;
use crate::transport::{FrameSocket, TransportError, WsSocket};

/// Pause before retrying a failed probe read.
const PROBE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Dials the websocket for a negotiated session.
pub struct UpgradeClient {
    endpoint: Url,
    cookies: SessionCookies,
    user_agent: String,
    probe_timeout: Duration,
}

impl UpgradeClient {
    #[must_use]
    pub fn new(endpoint: Url, cookies: SessionCookies, user_agent: String, probe_timeout: Duration) -> Self {
        Self { endpoint, cookies, user_agent, probe_timeout }
    }

    /// Dial the websocket and run the probe exchange.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Upgrade`] if the dial fails, the remote does not
    /// switch protocols, or the probe does not finish within the deadline.
    pub async fn upgrade(&self, sid: &str) -> Result<WsSocket, SessionError> {
        let mut socket = self.connect(sid).await?;
        probe(&mut socket, self.probe_timeout).await?;
        Ok(socket)
    }

    /// Dial the websocket without probing.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Upgrade`] on dial failure or a non-101 response.
    pub async fn connect(&self, sid: &str) -> Result<WsSocket, SessionError> {
        let url = websocket_url(&self.endpoint, sid)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| SessionError::Upgrade(format!("invalid websocket request: {e}")))?;

        let headers = request.headers_mut();
        if let Some(cookie) = self.cookies.header_for(&self.endpoint) {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| SessionError::Upgrade(format!("invalid cookie header: {e}")))?;
            headers.insert(header::COOKIE, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(header::USER_AGENT, value);
        }

        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| SessionError::Upgrade(format!("websocket dial failed: {e}")))?;

        if response.status() != StatusCode::SWITCHING_PROTOCOLS {
            return Err(SessionError::Upgrade(format!(
                "remote did not switch protocols: status {}",
                response.status().as_u16()
            )));
        }

        tracing::debug!(%url, "websocket connected");
        Ok(WsSocket::new(stream))
    }
}

/// Endpoint rewritten to the websocket scheme with `transport=websocket`.
///
/// # Errors
///
/// Returns [`SessionError::Upgrade`] for endpoints that are not http(s).
pub fn websocket_url(endpoint: &Url, sid: &str) -> Result<Url, SessionError> {
    let scheme = match endpoint.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => return Err(SessionError::Upgrade(format!("cannot upgrade scheme '{other}'"))),
    };
    let mut url = transport_url(endpoint, "websocket", Some(sid));
    url.set_scheme(scheme)
        .map_err(|()| SessionError::Upgrade(format!("cannot rewrite scheme to '{scheme}'")))?;
    Ok(url)
}

/// Run the probe exchange on `socket`, bounded by `deadline`.
///
/// Read errors are treated as transient and retried; a closed stream is
/// fatal. Only the deadline stops a remote that never finishes the probe.
///
/// # Errors
///
/// Returns [`SessionError::Upgrade`] on deadline expiry, stream close, or a
/// failed send.
pub async fn probe<S: FrameSocket>(socket: &mut S, deadline: Duration) -> Result<(), SessionError> {
    match tokio::time::timeout(deadline, probe_exchange(socket)).await {
        Ok(result) => result,
        Err(_) => Err(SessionError::Upgrade(format!(
            "probe did not complete within {}ms",
            deadline.as_millis()
        ))),
    }
}

async fn probe_exchange<S: FrameSocket>(socket: &mut S) -> Result<(), SessionError> {
    send_probe_frame(socket, frames::PROBE_REQUEST).await?;

    loop {
        let text = match socket.recv_text().await {
            Ok(text) => text,
            Err(TransportError::Closed) => {
                return Err(SessionError::Upgrade("socket closed during probe".into()));
            }
            Err(err) => {
                tracing::warn!(error = %err, "probe read failed; retrying");
                tokio::time::sleep(PROBE_RETRY_DELAY).await;
                continue;
            }
        };

        match frames::decode(&text) {
            frames::Frame::ProbeAck => {
                tracing::debug!("probe acknowledged; confirming upgrade");
                send_probe_frame(socket, frames::UPGRADE).await?;
            }
            frames::Frame::Ping => send_probe_frame(socket, frames::PONG).await?,
            frames::Frame::Noop => {
                tracing::debug!("probe complete");
                return Ok(());
            }
            other => tracing::debug!(frame = ?other, "ignoring frame during probe"),
        }
    }
}

async fn send_probe_frame<S: FrameSocket>(socket: &mut S, text: &str) -> Result<(), SessionError> {
    socket
        .send_text(text)
        .await
        .map_err(|e| SessionError::Upgrade(format!("probe send of {text:?} failed: {e}")))
}

#[cfg(test)]
#[path = "upgrade_test.rs"]
mod tests;
