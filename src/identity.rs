//! Client identity: random tokens, device id, frontend UUIDs and the fixed
//! mobile-client headers every polling request carries.

use reqwest::header::{ACCEPT, ACCEPT_ENCODING, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use uuid::Uuid;

use crate::error::SessionError;

pub const APP_VERSION: &str = "1.0.23";
pub const CLIENT_VERSION: &str = "1.0.23";
pub const API_VERSION: &str = "1.0";
pub const ASK_VERSION: &str = "Ask/1.0.23/260023";
pub const CLIENT_NAME: &str = "Perplexity-Android";
pub const API_CLIENT: &str = "android";

/// Device the user agent claims to run on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    pub android_version: u32,
    pub sdk_version: u32,
    pub vendor: String,
    pub model: String,
    pub build_id: String,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            android_version: 13,
            sdk_version: 33,
            vendor: "Xiaomi".to_owned(),
            model: "M2011K2G".to_owned(),
            build_id: "TQ1A.230205.002".to_owned(),
        }
    }
}

impl DeviceProfile {
    /// `Ask/<ver> (Android; Version <n>; <vendor> <model>/<build>) SDK <sdk>`
    #[must_use]
    pub fn user_agent(&self) -> String {
        format!(
            "{ASK_VERSION} (Android; Version {}; {} {}/{}) SDK {}",
            self.android_version, self.vendor, self.model, self.build_id, self.sdk_version
        )
    }
}

/// Identity material for one session. Generated once and reused for every
/// request and ask in that session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// 3 random bytes, hex.
    pub token: String,
    /// 8 random bytes, hex.
    pub device_id: String,
    pub frontend_uuid: Uuid,
    pub frontend_session_id: Uuid,
    pub user_agent: String,
}

impl Identity {
    /// Fresh random identity for the default device profile.
    #[must_use]
    pub fn generate() -> Self {
        Self::for_device(&DeviceProfile::default())
    }

    #[must_use]
    pub fn for_device(device: &DeviceProfile) -> Self {
        Self {
            token: hex(&rand::random::<[u8; 3]>()),
            device_id: hex(&rand::random::<[u8; 8]>()),
            frontend_uuid: Uuid::new_v4(),
            frontend_session_id: Uuid::new_v4(),
            user_agent: device.user_agent(),
        }
    }

    /// Headers sent with every polling request.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the user agent is not a valid
    /// header value.
    pub fn client_headers(&self) -> Result<HeaderMap, SessionError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|e| SessionError::Config(format!("invalid user agent: {e}")))?,
        );
        headers.insert(HeaderName::from_static("x-app.version"), HeaderValue::from_static(APP_VERSION));
        headers.insert(HeaderName::from_static("x-client-version"), HeaderValue::from_static(CLIENT_VERSION));
        headers.insert(HeaderName::from_static("x-client-name"), HeaderValue::from_static(CLIENT_NAME));
        headers.insert(HeaderName::from_static("x-app-apiclient"), HeaderValue::from_static(API_CLIENT));
        headers.insert(HeaderName::from_static("x-app-apiversion"), HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
