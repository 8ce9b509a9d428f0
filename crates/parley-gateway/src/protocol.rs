//! Gateway wire protocol.
//!
//! Every message is a JSON object tagged by `type`:
//!
//! ```json
//! { "type": "req",   "id": "req-1", "method": "chat.history", "params": { ... } }
//! { "type": "res",   "id": "req-1", "ok": true, "payload": { ... } }
//! { "type": "event", "event": "chat", "payload": { "text": "Hi", "done": false } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use parley_core::GatewayError;

/// Fixed correlation id of the handshake request.
pub const CONNECT_REQUEST_ID: &str = "connect-1";

/// Event name of the server-initiated handshake challenge.
pub const CHALLENGE_EVENT: &str = "connect.challenge";

/// Event name carrying streamed chat text.
pub const CHAT_EVENT: &str = "chat";

/// Reply used when a turn finishes with neither streamed nor historical text.
pub const NO_CONTENT_REPLY: &str = "Received, but no response content found.";

/// One message on the gateway socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    Req {
        id: String,
        method: String,
        #[serde(default, skip_serializing_if = "Value::is_null")]
        params: Value,
    },
    Res {
        id: String,
        #[serde(default)]
        ok: bool,
        #[serde(default, skip_serializing_if = "Value::is_null")]
        payload: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<Value>,
    },
    Event {
        event: String,
        #[serde(default, skip_serializing_if = "Value::is_null")]
        payload: Value,
    },
}

impl Frame {
    /// Parse one text message from the socket.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serialize a request frame ready to be written to the socket.
    pub fn request_text<P: Serialize + ?Sized>(
        id: &str,
        method: &str,
        params: &P,
    ) -> Result<String, GatewayError> {
        let params =
            serde_json::to_value(params).map_err(|e| GatewayError::Protocol(e.to_string()))?;
        let frame = Self::Req {
            id: id.to_string(),
            method: method.to_string(),
            params,
        };
        serde_json::to_string(&frame).map_err(|e| GatewayError::Protocol(e.to_string()))
    }
}

/// Human-readable message out of a `res` frame's `error` field.
///
/// Servers send either `{ "message": "..." }`, a bare string, or something
/// else entirely.
pub fn error_message(error: Option<&Value>, fallback: &str) -> String {
    match error {
        Some(Value::String(message)) => message.clone(),
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| Value::Object(map.clone()).to_string(), str::to_string),
        Some(Value::Null) | None => fallback.to_string(),
        Some(other) => other.to_string(),
    }
}

// ── Handshake ──────────────────────────────────────────────────────

/// Parameters of the `connect` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub min_protocol: u32,
    pub max_protocol: u32,
    pub client: ClientDescriptor,
    pub role: String,
    pub scopes: Vec<String>,
    pub auth: AuthParams,
}

/// Who is connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientDescriptor {
    pub id: String,
    pub version: String,
    pub platform: String,
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthParams {
    pub token: String,
}

// ── Chat ───────────────────────────────────────────────────────────

/// Parameters of `chat.send`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendParams<'a> {
    pub session_key: &'a str,
    pub idempotency_key: String,
    pub message: &'a str,
}

/// Parameters of `chat.history`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryParams<'a> {
    pub session_key: &'a str,
    pub limit: u32,
}

/// Payload of a `chat` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatPayload {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub done: Option<bool>,
}

impl ChatPayload {
    /// Whether this event ends the turn.
    pub fn is_terminal(&self) -> bool {
        self.state.as_deref() == Some("final") || self.done == Some(true)
    }

    /// Streamed text carried by this event, if any.
    pub fn fragment(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.is_empty())
    }
}

/// Payload of a `chat.history` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatHistory {
    #[serde(default)]
    pub messages: Vec<HistoryMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl ChatHistory {
    /// Text part of the first assistant message, if any.
    pub fn assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|message| message.role == "assistant")?
            .content
            .iter()
            .find(|part| part.kind == "text")?
            .text
            .as_deref()
    }
}

// ── Events ─────────────────────────────────────────────────────────

/// Known event shapes plus a catch-all.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    Challenge,
    Chat(ChatPayload),
    Other { name: String, payload: Value },
}

impl GatewayEvent {
    pub fn classify(name: &str, payload: Value) -> Self {
        match name {
            CHALLENGE_EVENT => Self::Challenge,
            CHAT_EVENT => Self::Chat(serde_json::from_value(payload).unwrap_or_default()),
            _ => Self::Other {
                name: name.to_string(),
                payload,
            },
        }
    }
}

/// Text recovered from an event whose name is not `chat`.
///
/// Event names on the gateway vary between versions, so unknown events are
/// inspected for a plausible text field while a chat turn is streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LooseText {
    /// A `text` field: treated like a streamed fragment.
    Fragment(String),
    /// A `message` or `result` field: used only if nothing streamed yet.
    Summary(String),
}

/// Look for text in an unrecognized event payload.
pub fn loose_text(payload: &Value) -> Option<LooseText> {
    let field = |key: &str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    };

    field("text")
        .map(LooseText::Fragment)
        .or_else(|| field("message").map(LooseText::Summary))
        .or_else(|| field("result").map(LooseText::Summary))
}
