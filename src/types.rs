//! Payload types exchanged with the answer service.
//!
//! Only a handful of fields are load-bearing for the session engine
//! (descriptor `sid`, envelope `backend_uuid`/`read_write_token`/`text`,
//! details `answer`). Everything else is carried along with serde defaults so
//! the remote can add or drop fields without breaking decoding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// SEARCH OPTIONS
// =============================================================================

/// Which corpus the remote should search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchFocus {
    #[serde(rename = "internet")]
    Internet,
    #[serde(rename = "writing")]
    Writing,
    #[serde(rename = "scholar")]
    Academic,
    #[serde(rename = "wolfram")]
    WolframAlpha,
    #[serde(rename = "youtube")]
    YouTube,
    #[serde(rename = "reddit")]
    Reddit,
}

impl SearchFocus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Internet => "internet",
            Self::Writing => "writing",
            Self::Academic => "scholar",
            Self::WolframAlpha => "wolfram",
            Self::YouTube => "youtube",
            Self::Reddit => "reddit",
        }
    }
}

impl FromStr for SearchFocus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "internet" => Ok(Self::Internet),
            "writing" => Ok(Self::Writing),
            "scholar" => Ok(Self::Academic),
            "wolfram" => Ok(Self::WolframAlpha),
            "youtube" => Ok(Self::YouTube),
            "reddit" => Ok(Self::Reddit),
            other => Err(format!(
                "unknown search focus '{other}' (expected internet, writing, scholar, wolfram, youtube or reddit)"
            )),
        }
    }
}

impl fmt::Display for SearchFocus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client surface the request claims to come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    Android,
    Default,
}

impl FromStr for SearchSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "android" => Ok(Self::Android),
            "default" => Ok(Self::Default),
            other => Err(format!("unknown search source '{other}' (expected android or default)")),
        }
    }
}

/// Answer style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Concise,
    Copilot,
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "concise" => Ok(Self::Concise),
            "copilot" => Ok(Self::Copilot),
            other => Err(format!("unknown search mode '{other}' (expected concise or copilot)")),
        }
    }
}

// =============================================================================
// HANDSHAKE
// =============================================================================

/// Session descriptor returned by the first polling request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds.
    pub ping_timeout: u64,
    /// Milliseconds.
    pub ping_interval: u64,
}

// =============================================================================
// ASK
// =============================================================================

/// Second argument of the ask event: identity plus conversation continuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskRequest {
    pub source: SearchSource,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    pub token: String,
    pub frontend_uuid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub frontend_session_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_backend_uuid: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub use_inhouse_model: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub read_write_token: String,
    pub conversational_enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub android_device_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timezone: String,
    pub search_focus: SearchFocus,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub gpt4: bool,
    pub mode: SearchMode,
}

// =============================================================================
// ANSWER
// =============================================================================

/// Argument of `query_progress` and `query_answered` events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerEnvelope {
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub uuid: String,
    /// Null on progress frames.
    pub read_write_token: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub backend_uuid: String,
    /// Serialized [`AnswerDetails`].
    #[serde(deserialize_with = "null_as_default")]
    pub text: String,
    pub query_str: Option<String>,
    pub step_type: Option<String>,
    pub mode: Option<String>,
    pub search_focus: Option<String>,
    pub context_uuid: Option<String>,
    pub thread_title: Option<String>,
    pub related_queries: Option<Vec<serde_json::Value>>,
}

/// Answer document nested in [`AnswerEnvelope::text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerDetails {
    pub answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub web_results: Vec<WebResult>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub extra_web_results: Vec<WebResult>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chunks: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub search_focus: String,
}

/// A cited source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebResult {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub snippet: String,
    #[serde(deserialize_with = "null_as_default")]
    pub client: String,
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
