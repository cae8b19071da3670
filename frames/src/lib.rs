//! Engine.IO / Socket.IO text framing for the answer-service socket.
//!
//! This crate owns the wire representation shared by the polling handshake,
//! the websocket probe and the session read loop. Every websocket text message
//! is exactly one frame, so nothing here buffers partial input or does I/O.
//!
//! Inbound frames are classified by prefix into [`Frame`]. Classification is
//! total: anything unrecognised becomes [`Frame::Unclassified`] and it is up to
//! the caller to decide whether that is fatal.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

// =============================================================================
// WIRE LITERALS
// =============================================================================

/// Socket.IO connect packet, posted over polling to open the default namespace.
pub const CONNECT: &str = "40";

/// Probe request sent on a freshly dialed websocket.
pub const PROBE_REQUEST: &str = "2probe";

/// Probe acknowledgement sent back by the remote.
pub const PROBE_ACK: &str = "3probe";

/// Upgrade confirmation, sent after the probe acknowledgement.
pub const UPGRADE: &str = "5";

/// Noop packet; the remote uses it to signal the end of the probe exchange.
pub const NOOP: &str = "6";

/// Heartbeat ping sent by the remote.
pub const PING: &str = "2";

/// Heartbeat pong, the only valid reply to [`PING`].
pub const PONG: &str = "3";

/// Engine.IO message packet carrying a Socket.IO event.
pub const EVENT_PREFIX: &str = "42";

/// Body prefix of a polling response that confirms the namespace connect.
pub const SESSION_CONFIRMED_MARKER: &str = "40{\"sid\":";

/// Outbound event carrying a question.
pub const ASK_EVENT: &str = "perplexity_ask";

/// Inbound non-terminal event emitted while an answer is being produced.
pub const PROGRESS_EVENT: &str = "query_progress";

/// Inbound terminal event carrying the answer envelope.
pub const ANSWERED_EVENT: &str = "query_answered";

// =============================================================================
// ERROR
// =============================================================================

/// Error returned when a frame cannot be turned into the shape the caller needs.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame matched none of the known packet forms.
    #[error("unclassified frame: {0}")]
    Unclassified(String),
    /// A known control frame was found where an event was required.
    #[error("expected an event frame, got {0:?}")]
    NotAnEvent(PacketType),
    /// The event body or one of its arguments is not valid JSON for the target type.
    #[error("invalid event JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// The event carried fewer arguments than requested.
    #[error("event `{event}` has no argument at index {index}")]
    MissingArgument { event: String, index: usize },
}

// =============================================================================
// PACKET TYPES
// =============================================================================

/// Engine.IO packet type, the leading character of every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketType {
    Open,
    Close,
    Ping,
    Pong,
    Message,
    Upgrade,
    Noop,
}

impl PacketType {
    /// Wire character for this packet type.
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            Self::Open => '0',
            Self::Close => '1',
            Self::Ping => '2',
            Self::Pong => '3',
            Self::Message => '4',
            Self::Upgrade => '5',
            Self::Noop => '6',
        }
    }

    /// Parse a packet type from its wire character.
    #[must_use]
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Self::Open),
            '1' => Some(Self::Close),
            '2' => Some(Self::Ping),
            '3' => Some(Self::Pong),
            '4' => Some(Self::Message),
            '5' => Some(Self::Upgrade),
            '6' => Some(Self::Noop),
            _ => None,
        }
    }
}

/// Application meaning of an event frame, derived from its name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Ask,
    Progress,
    Answered,
    Other,
}

impl EventKind {
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            ASK_EVENT => Self::Ask,
            PROGRESS_EVENT => Self::Progress,
            ANSWERED_EVENT => Self::Answered,
            _ => Self::Other,
        }
    }
}

// =============================================================================
// FRAMES
// =============================================================================

/// A single classified frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// `0{...}`: session descriptor payload.
    Open(String),
    /// `1`
    Close,
    /// `2`: heartbeat ping, must be answered with [`PONG`].
    Ping,
    /// `3`
    Pong,
    /// `2probe`
    ProbeRequest,
    /// `3probe`
    ProbeAck,
    /// `5`
    Upgrade,
    /// `6`: also the remote's close-probe signal.
    Noop,
    /// `40{...}`: namespace connect with optional payload.
    Connect(String),
    /// `42[...]` or `42<id>[...]`.
    Event(EventFrame),
    /// Anything else, kept verbatim.
    Unclassified(String),
}

impl Frame {
    /// Engine.IO packet type of this frame, `None` for unclassified text.
    #[must_use]
    pub fn packet_type(&self) -> Option<PacketType> {
        match self {
            Self::Open(_) => Some(PacketType::Open),
            Self::Close => Some(PacketType::Close),
            Self::Ping | Self::ProbeRequest => Some(PacketType::Ping),
            Self::Pong | Self::ProbeAck => Some(PacketType::Pong),
            Self::Connect(_) | Self::Event(_) => Some(PacketType::Message),
            Self::Upgrade => Some(PacketType::Upgrade),
            Self::Noop => Some(PacketType::Noop),
            Self::Unclassified(_) => None,
        }
    }

    /// Unwrap an event frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Unclassified`] for unrecognised text and
    /// [`CodecError::NotAnEvent`] for any control frame.
    pub fn into_event(self) -> Result<EventFrame, CodecError> {
        match self {
            Self::Event(event) => Ok(event),
            Self::Unclassified(raw) => Err(CodecError::Unclassified(raw)),
            other => Err(CodecError::NotAnEvent(
                other.packet_type().unwrap_or(PacketType::Message),
            )),
        }
    }
}

/// Socket.IO event: an optional ack/sequence id and a JSON array body whose
/// first element is the event name.
///
/// The body is kept as text and only parsed when arguments are requested, so
/// classifying a frame never depends on its payload being valid JSON.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventFrame {
    ack_id: Option<u64>,
    name: String,
    body: String,
}

impl EventFrame {
    #[must_use]
    pub fn ack_id(&self) -> Option<u64> {
        self.ack_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        EventKind::from_name(&self.name)
    }

    /// Parse the body and return the arguments following the event name.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidJson`] when the body is not a JSON array.
    pub fn args(&self) -> Result<Vec<Value>, CodecError> {
        let values: Vec<Value> = serde_json::from_str(&self.body)?;
        Ok(values.into_iter().skip(1).collect())
    }

    /// Deserialize argument `index` (0 is the first argument after the name).
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MissingArgument`] when the event has too few
    /// arguments, or [`CodecError::InvalidJson`] when parsing fails.
    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, CodecError> {
        let value = self
            .args()?
            .into_iter()
            .nth(index)
            .ok_or_else(|| CodecError::MissingArgument {
                event: self.name.clone(),
                index,
            })?;
        Ok(serde_json::from_value(value)?)
    }
}

// =============================================================================
// DECODE
// =============================================================================

/// Classify one inbound frame. Never fails.
#[must_use]
pub fn decode(text: &str) -> Frame {
    match text {
        PING => return Frame::Ping,
        PONG => return Frame::Pong,
        PROBE_REQUEST => return Frame::ProbeRequest,
        PROBE_ACK => return Frame::ProbeAck,
        UPGRADE => return Frame::Upgrade,
        NOOP => return Frame::Noop,
        "1" => return Frame::Close,
        _ => {}
    }

    if let Some(rest) = text.strip_prefix(EVENT_PREFIX) {
        return parse_event(rest).map_or_else(|| Frame::Unclassified(text.to_owned()), Frame::Event);
    }
    if let Some(rest) = text.strip_prefix(CONNECT) {
        return Frame::Connect(rest.to_owned());
    }
    if let Some(rest) = text.strip_prefix(PacketType::Open.as_char()) {
        return Frame::Open(rest.to_owned());
    }

    Frame::Unclassified(text.to_owned())
}

/// Decode a frame that must be an event.
///
/// # Errors
///
/// See [`Frame::into_event`].
pub fn decode_event(text: &str) -> Result<EventFrame, CodecError> {
    decode(text).into_event()
}

fn parse_event(rest: &str) -> Option<EventFrame> {
    let digits = rest.find('[')?;
    let ack_id = match &rest[..digits] {
        "" => None,
        id => match id.parse::<u64>() {
            Ok(id) => Some(id),
            Err(_) => return None,
        },
    };
    let body = &rest[digits..];
    let name = leading_name(body)?;

    Some(EventFrame {
        ack_id,
        name: name.to_owned(),
        body: body.to_owned(),
    })
}

/// First string element of a JSON array, read without parsing the rest.
/// Event names never contain escaped quotes.
fn leading_name(body: &str) -> Option<&str> {
    let rest = body.strip_prefix('[')?.trim_start().strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(&rest[..end])
}

// =============================================================================
// ENCODE
// =============================================================================

/// Encode an event frame: `42` + optional sequence id + `[name, ...args]`.
///
/// # Errors
///
/// Returns [`CodecError::InvalidJson`] if an argument cannot be serialized.
pub fn encode_event(seq: Option<u64>, name: &str, args: &[Value]) -> Result<String, CodecError> {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(serde_json::to_string(name)?);
    for arg in args {
        parts.push(serde_json::to_string(arg)?);
    }
    Ok(join_event(seq, &parts))
}

/// Encode the ask event: `42<seq>["perplexity_ask",<question>,<request>]`.
///
/// The request is serialized directly so its field order is preserved.
///
/// # Errors
///
/// Returns [`CodecError::InvalidJson`] if the request cannot be serialized.
pub fn encode_ask<T: Serialize>(seq: u64, question: &str, request: &T) -> Result<String, CodecError> {
    let parts = [
        serde_json::to_string(ASK_EVENT)?,
        serde_json::to_string(question)?,
        serde_json::to_string(request)?,
    ];
    Ok(join_event(Some(seq), &parts))
}

fn join_event(seq: Option<u64>, parts: &[String]) -> String {
    let seq = seq.map(|s| s.to_string()).unwrap_or_default();
    format!("{EVENT_PREFIX}{seq}[{}]", parts.join(","))
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
