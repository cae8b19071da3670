//! Client configuration parsed from environment variables.

use std::time::Duration;

use reqwest::Url;

use crate::error::SessionError;
use crate::types::{SearchFocus, SearchMode, SearchSource};

pub const DEFAULT_ENDPOINT: &str = "https://www.perplexity.ai/socket.io/";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_MAX_FRAMES_PER_ANSWER: usize = 10_000;
pub const DEFAULT_LANGUAGE: &str = "en-US";
pub const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Per polling request.
    pub request: Duration,
    pub connect: Duration,
    /// Upper bound on the whole websocket probe exchange.
    pub probe: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            probe: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
        }
    }
}

/// Per-question options copied into every ask request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskOptions {
    pub language: String,
    pub timezone: String,
    pub search_focus: SearchFocus,
    pub mode: SearchMode,
    pub source: SearchSource,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_owned(),
            timezone: DEFAULT_TIMEZONE.to_owned(),
            search_focus: SearchFocus::Writing,
            mode: SearchMode::Concise,
            source: SearchSource::Default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Socket.IO endpoint, `http(s)://host/socket.io/`.
    pub endpoint: String,
    pub timeouts: Timeouts,
    /// Ceiling on frames read while waiting for one answer.
    pub max_frames_per_answer: usize,
    pub ask: AskOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            timeouts: Timeouts::default(),
            max_frames_per_answer: DEFAULT_MAX_FRAMES_PER_ANSWER,
            ask: AskOptions::default(),
        }
    }
}

impl ClientConfig {
    /// Build config from environment variables, falling back to defaults.
    ///
    /// Optional:
    /// - `PPLX_ENDPOINT`: default `https://www.perplexity.ai/socket.io/`
    /// - `PPLX_REQUEST_TIMEOUT_SECS`: default 30
    /// - `PPLX_CONNECT_TIMEOUT_SECS`: default 10
    /// - `PPLX_PROBE_TIMEOUT_SECS`: default 15
    /// - `PPLX_MAX_FRAMES_PER_ANSWER`: default 10000
    /// - `PPLX_LANGUAGE`: default `en-US`
    /// - `PPLX_TIMEZONE`: default `Asia/Shanghai`
    /// - `PPLX_SEARCH_FOCUS`: `writing` (default), `internet`, `scholar`,
    ///   `wolfram`, `youtube`, `reddit`
    /// - `PPLX_SEARCH_MODE`: `concise` (default) or `copilot`
    /// - `PPLX_SEARCH_SOURCE`: `default` (default) or `android`
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for an unparsable endpoint or an
    /// unknown search option. Unparsable numbers fall back to defaults.
    pub fn from_env() -> Result<Self, SessionError> {
        let endpoint = match env_string("PPLX_ENDPOINT") {
            Some(raw) => parse_endpoint(raw.trim())?.to_string(),
            None => DEFAULT_ENDPOINT.to_owned(),
        };
        let timeouts = Timeouts {
            request: Duration::from_secs(env_parse("PPLX_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)),
            connect: Duration::from_secs(env_parse("PPLX_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)),
            probe: Duration::from_secs(env_parse("PPLX_PROBE_TIMEOUT_SECS", DEFAULT_PROBE_TIMEOUT_SECS)),
        };
        let max_frames_per_answer = env_parse("PPLX_MAX_FRAMES_PER_ANSWER", DEFAULT_MAX_FRAMES_PER_ANSWER);

        let defaults = AskOptions::default();
        let ask = AskOptions {
            language: env_string("PPLX_LANGUAGE").unwrap_or(defaults.language),
            timezone: env_string("PPLX_TIMEZONE").unwrap_or(defaults.timezone),
            search_focus: env_option("PPLX_SEARCH_FOCUS", defaults.search_focus)?,
            mode: env_option("PPLX_SEARCH_MODE", defaults.mode)?,
            source: env_option("PPLX_SEARCH_SOURCE", defaults.source)?,
        };

        Ok(Self { endpoint, timeouts, max_frames_per_answer, ask })
    }
}

/// Parse and validate a Socket.IO endpoint URL.
///
/// # Errors
///
/// Returns [`SessionError::Config`] when the URL is invalid or not http(s).
pub fn parse_endpoint(raw: &str) -> Result<Url, SessionError> {
    let url = Url::parse(raw).map_err(|e| SessionError::Config(format!("invalid endpoint '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SessionError::Config(format!(
            "unsupported endpoint scheme '{other}' (expected http or https)"
        ))),
    }
}

fn env_string(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env_string(key).map(|raw| raw.trim().parse::<T>()) {
        Some(Ok(value)) => value,
        _ => default,
    }
}

fn env_option<T>(key: &str, default: T) -> Result<T, SessionError>
where
    T: std::str::FromStr<Err = String>,
{
    match env_string(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| SessionError::Config(format!("{key}: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
