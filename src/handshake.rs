//! Polling-transport handshake.
//!
//! Three requests against the Socket.IO endpoint, in order:
//!
//! 1. `GET ?EIO=4&transport=polling` returns `0{descriptor}`; the descriptor
//!    carries the session id.
//! 2. `POST ...&sid=<sid>` with body `40` connects the default namespace; the
//!    remote answers `OK`.
//! 3. `GET ...&sid=<sid>` returns the namespace connect ack `40{"sid":...}`.
//!
//! Bodies come back gzip-compressed because we advertise `accept-encoding:
//! gzip` ourselves, so reqwest does not inflate them for us.

use std::io::Read;

use flate2::read::GzDecoder;
use reqwest::Url;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::config::Timeouts;
use crate::cookies::SessionCookies;
use crate::error::SessionError;
use crate::identity::Identity;
use crate::types::SessionDescriptor;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const CONFIRM_OK: &str = "OK";
const POLLING_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";

/// HTTP client for the polling phase of one session.
pub struct HandshakeClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl HandshakeClient {
    /// Build a polling client sharing `cookies` and sending `identity` headers.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the identity headers are invalid or
    /// the HTTP client cannot be built.
    pub fn new(
        endpoint: Url,
        cookies: &SessionCookies,
        identity: &Identity,
        timeouts: &Timeouts,
    ) -> Result<Self, SessionError> {
        let http = reqwest::Client::builder()
            .default_headers(identity.client_headers()?)
            .cookie_provider(cookies.jar())
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()
            .map_err(|e| SessionError::Config(format!("HTTP client build failed: {e}")))?;
        Ok(Self { http, endpoint })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Open a polling session and return its descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Handshake`] on transport failure, non-success
    /// status, an undecompressable body, or a malformed descriptor.
    pub async fn negotiate(&self) -> Result<SessionDescriptor, SessionError> {
        let url = polling_url(&self.endpoint, None);
        let body = self.fetch(self.http.get(url)).await?;
        let descriptor = parse_descriptor(&body)?;
        tracing::debug!(
            sid = %descriptor.sid,
            ping_interval_ms = descriptor.ping_interval,
            ping_timeout_ms = descriptor.ping_timeout,
            "negotiated polling session"
        );
        Ok(descriptor)
    }

    /// Post the namespace connect packet and require `OK`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Handshake`] when the response is anything else.
    pub async fn confirm_live(&self, sid: &str) -> Result<(), SessionError> {
        let url = polling_url(&self.endpoint, Some(sid));
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(POLLING_CONTENT_TYPE));
        let request = self.http.post(url).headers(headers).body(frames::CONNECT);

        let body = self.fetch(request).await?;
        check_confirmation(&body)
    }

    /// Poll once and require the namespace connect acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Handshake`] when the body lacks `40{"sid":`.
    pub async fn verify_session(&self, sid: &str) -> Result<(), SessionError> {
        let url = polling_url(&self.endpoint, Some(sid));
        let body = self.fetch(self.http.get(url)).await?;
        check_session_marker(&body)
    }

    async fn fetch(&self, request: reqwest::RequestBuilder) -> Result<String, SessionError> {
        let response = request
            .send()
            .await
            .map_err(|e| SessionError::Handshake(format!("polling request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Handshake(format!("polling request returned status {}", status.as_u16())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SessionError::Handshake(format!("polling body read failed: {e}")))?;
        decode_body(&bytes)
    }
}

/// Endpoint with `EIO=4`, `transport=polling` and, once known, `sid`.
#[must_use]
pub fn polling_url(endpoint: &Url, sid: Option<&str>) -> Url {
    transport_url(endpoint, "polling", sid)
}

pub(crate) fn transport_url(endpoint: &Url, transport: &str, sid: Option<&str>) -> Url {
    let mut url = endpoint.clone();
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        query.append_pair("EIO", "4");
        query.append_pair("transport", transport);
        if let Some(sid) = sid {
            query.append_pair("sid", sid);
        }
    }
    url
}

/// Inflate a gzip body, or pass a plain one through, and require UTF-8.
///
/// # Errors
///
/// Returns [`SessionError::Handshake`] for corrupt gzip or non-UTF-8 bodies.
pub fn decode_body(bytes: &[u8]) -> Result<String, SessionError> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return String::from_utf8(bytes.to_vec())
            .map_err(|e| SessionError::Handshake(format!("polling body is not UTF-8: {e}")));
    }

    let mut body = String::new();
    GzDecoder::new(bytes)
        .read_to_string(&mut body)
        .map_err(|e| SessionError::Handshake(format!("polling body decompression failed: {e}")))?;
    Ok(body)
}

/// Parse the descriptor after the one-byte open-packet prefix.
///
/// # Errors
///
/// Returns [`SessionError::Handshake`] for an empty body or a payload that is
/// not a descriptor.
pub fn parse_descriptor(body: &str) -> Result<SessionDescriptor, SessionError> {
    let mut chars = body.chars();
    if chars.next().is_none() {
        return Err(SessionError::Handshake("empty session descriptor".into()));
    }
    serde_json::from_str(chars.as_str())
        .map_err(|e| SessionError::Handshake(format!("malformed session descriptor: {e}")))
}

fn check_confirmation(body: &str) -> Result<(), SessionError> {
    if body == CONFIRM_OK {
        Ok(())
    } else {
        Err(SessionError::Handshake(format!("session check failed: expected {CONFIRM_OK}, got {body:?}")))
    }
}

fn check_session_marker(body: &str) -> Result<(), SessionError> {
    if body.contains(frames::SESSION_CONFIRMED_MARKER) {
        Ok(())
    } else {
        Err(SessionError::Handshake(format!("session verification failed: got {body:?}")))
    }
}

#[cfg(test)]
#[path = "handshake_test.rs"]
mod tests;
