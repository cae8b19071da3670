//! Session cookie store.
//!
//! The remote sets affinity cookies on the first polling response and expects
//! them back verbatim on every later request, including the websocket dial.
//! reqwest writes into the shared jar; the upgrade reads it back as a header.

use std::sync::Arc;

use reqwest::Url;
use reqwest::cookie::{CookieStore, Jar};

/// Cheaply cloneable handle to one session's cookie jar.
#[derive(Debug, Clone, Default)]
pub struct SessionCookies {
    jar: Arc<Jar>,
}

impl SessionCookies {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Jar to install on the polling HTTP client.
    #[must_use]
    pub fn jar(&self) -> Arc<Jar> {
        Arc::clone(&self.jar)
    }

    /// Record a raw `Set-Cookie` value as if it came from `url`.
    pub fn add(&self, set_cookie: &str, url: &Url) {
        self.jar.add_cookie_str(set_cookie, url);
    }

    /// All cookies applicable to `url` as `name=value; name=value`, or `None`
    /// when the jar holds nothing for it.
    #[must_use]
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let value = self.jar.cookies(url)?;
        match value.to_str() {
            Ok(s) if !s.is_empty() => Some(s.to_owned()),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "cookies_test.rs"]
mod tests;
