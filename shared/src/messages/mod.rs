mod error;

pub use error::MessageError;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fragment::SyncFragment;

/// Protocol version advertised in `SessionCreate`.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Structured error carried by failed replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
}

/// The closed set of framed protocol messages. Encode/decode dispatch on the
/// wire `type` field; unknown types are dropped individually with a warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    SessionCreate {
        index: u64,
        version: String,
    },
    SessionCreateResponse {
        index: u64,
        #[serde(rename = "replyTo")]
        reply_to: u64,
        success: bool,
        #[serde(
            rename = "sessionToken",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        session_token: Option<String>,
    },
    ScopeFetch {
        index: u64,
        name: String,
        params: Value,
    },
    ScopeState {
        index: u64,
        #[serde(rename = "scopeIndex")]
        scope_index: u32,
        #[serde(rename = "rootFragment")]
        root_fragment: SyncFragment,
        #[serde(rename = "syncFragments")]
        sync_fragments: Vec<SyncFragment>,
    },
    ScopeSync {
        index: u64,
        #[serde(rename = "scopeIndex")]
        scope_index: u32,
        #[serde(rename = "syncFragments")]
        sync_fragments: Vec<SyncFragment>,
    },
    Ping {
        index: u64,
        ack: u64,
        #[serde(
            rename = "resendMissing",
            default,
            skip_serializing_if = "is_false"
        )]
        resend_missing: bool,
    },
    Reply {
        index: u64,
        #[serde(rename = "replyTo")]
        reply_to: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<bool>,
        #[serde(
            rename = "scopeIndex",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        scope_index: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorBody>,
    },
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Message {
    /// Session-assigned monotonic index.
    pub fn index(&self) -> u64 {
        match self {
            Message::SessionCreate { index, .. }
            | Message::SessionCreateResponse { index, .. }
            | Message::ScopeFetch { index, .. }
            | Message::ScopeState { index, .. }
            | Message::ScopeSync { index, .. }
            | Message::Ping { index, .. }
            | Message::Reply { index, .. } => *index,
        }
    }

    /// The originating index this message replies to, if it is a reply.
    pub fn reply_to(&self) -> Option<u64> {
        match self {
            Message::SessionCreateResponse { reply_to, .. } | Message::Reply { reply_to, .. } => {
                Some(*reply_to)
            }
            _ => None,
        }
    }

    pub fn is_ping(&self) -> bool {
        matches!(self, Message::Ping { .. })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Message::SessionCreate { .. } => "SessionCreate",
            Message::SessionCreateResponse { .. } => "SessionCreateResponse",
            Message::ScopeFetch { .. } => "ScopeFetch",
            Message::ScopeState { .. } => "ScopeState",
            Message::ScopeSync { .. } => "ScopeSync",
            Message::Ping { .. } => "Ping",
            Message::Reply { .. } => "Reply",
        }
    }
}

/// Encodes one message as a UTF-8 JSON object.
pub fn encode_message(message: &Message) -> Result<String, MessageError> {
    serde_json::to_string(message).map_err(|source| MessageError::EncodeFailed {
        message_type: message.type_name(),
        reason: source.to_string(),
    })
}

/// Decodes a transport payload: either one JSON object or an array treated
/// as a batch. Malformed or unknown-`type` elements are logged and dropped
/// individually; the rest of the batch survives.
pub fn decode_payload(payload: &str) -> Result<Vec<Message>, MessageError> {
    let parsed: Value =
        serde_json::from_str(payload).map_err(|source| MessageError::MalformedPayload {
            reason: source.to_string(),
        })?;

    let elements = match parsed {
        Value::Array(elements) => elements,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(MessageError::MalformedPayload {
                reason: format!("expected object or array, found {}", json_kind(&other)),
            });
        }
    };

    let mut messages = Vec::with_capacity(elements.len());
    for element in elements {
        match serde_json::from_value::<Message>(element) {
            Ok(message) => messages.push(message),
            Err(source) => {
                warn!("Dropping malformed message in payload: {}", source);
            }
        }
    }
    Ok(messages)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
