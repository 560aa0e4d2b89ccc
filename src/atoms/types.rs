// ── Kaiwa Atoms: Pure Data Types ───────────────────────────────────────────
// Wire types for the backend API, the stream event variants, and the
// session record. No logic beyond (de)serialization helpers.
//
// Id representation: the backend emits conversation/message ids as JSON
// numbers in stored data but relays the upstream engine's string ids in
// stream events. Both are held as `String`, preserved verbatim so the
// session can resubmit whatever the server issued.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ── Ids ────────────────────────────────────────────────────────────────────

/// Extract an id from a JSON value that may be a number or a string.
/// Empty strings and nulls yield `None`.
pub fn id_from_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    id_from_value(&v).ok_or_else(|| serde::de::Error::custom("expected a string or number id"))
}

fn opt_flexible_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(id_from_value(&v))
}

// ── Messages & conversations ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Anything else the backend might store. Skipped at replay.
    #[serde(other)]
    Unknown,
}

/// One stored message inside a conversation detail payload.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredMessage {
    #[serde(default, deserialize_with = "opt_flexible_id")]
    pub id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Sidebar entry from `GET /api/conversations`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationSummary {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub dify_app_name: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Full conversation detail from `GET /api/conversations/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Conversation {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub dify_app_id: i64,
    /// Upstream engine's own conversation id — passthrough, unused here.
    #[serde(default)]
    pub dify_conversation_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

/// Selectable application from `GET /api/dify-apps`.
#[derive(Debug, Clone, Deserialize)]
pub struct DifyApp {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// ── Outbound chat request ──────────────────────────────────────────────────

/// Body for `POST /api/chat-stream`. `conversation_id` is serialized as
/// `null` on the first turn — the backend keys on its presence.
#[derive(Debug, Clone, Serialize)]
pub struct ChatStreamRequest {
    pub message: String,
    pub dify_app_id: i64,
    pub conversation_id: Option<String>,
}

// ── Stream events ──────────────────────────────────────────────────────────

/// One decoded protocol record from the chat stream. Unknown event kinds
/// (`ping`, `workflow_started`, …) never reach this type — the decoder
/// drops them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental answer fragment, appended verbatim in arrival order.
    Message { answer: String },
    /// End of the assistant turn, optionally carrying server-assigned ids.
    MessageEnd {
        conversation_id: Option<String>,
        message_id: Option<String>,
    },
    /// Server-side failure surfaced to the user; does not stop the read.
    Error { message: String },
}

// ── Session ────────────────────────────────────────────────────────────────

/// The single mutable record of what is active: which conversation, which
/// application, and whether a send is in flight. Constructed once at
/// startup and threaded by shared reference into each component.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub conversation_id: Option<String>,
    pub app_id: Option<i64>,
    /// Advisory send-in-flight flag. A send while busy is refused, never
    /// queued.
    pub busy: bool,
}

impl Session {
    pub fn new(app_id: Option<i64>) -> Self {
        Session { conversation_id: None, app_id, busy: false }
    }

    /// "New chat": drop the active conversation, keep the app selection.
    pub fn start_new_chat(&mut self) {
        self.conversation_id = None;
    }

    /// Adopt a server-assigned conversation id.
    pub fn adopt_conversation(&mut self, id: impl Into<String>) {
        self.conversation_id = Some(id.into());
    }

    pub fn is_active(&self, conversation_id: &str) -> bool {
        self.conversation_id.as_deref() == Some(conversation_id)
    }
}

// ── Small helpers ──────────────────────────────────────────────────────────

/// Truncate on a char boundary — for log lines quoting stream payloads.
pub fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_accepts_numeric_id() {
        let json = r#"{"id": 7, "title": "hello", "dify_app_name": "sample1",
                       "created_at": "2025-06-01T09:30:00", "updated_at": "2025-06-01T09:31:00"}"#;
        let s: ConversationSummary = serde_json::from_str(json).unwrap();
        assert_eq!(s.id, "7");
        assert_eq!(s.dify_app_name, "sample1");
    }

    #[test]
    fn conversation_detail_round() {
        let json = r#"{
            "id": 3, "title": "t", "dify_app_id": 1,
            "dify_conversation_id": "abc-123",
            "messages": [
                {"id": 10, "role": "user", "content": "hi", "created_at": "2025-06-01T09:30:00"},
                {"id": 11, "role": "assistant", "content": "hello", "created_at": "2025-06-01T09:30:05"},
                {"role": "system", "content": "ignored"}
            ]
        }"#;
        let c: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(c.id, "3");
        assert_eq!(c.messages.len(), 3);
        assert_eq!(c.messages[0].role, Role::User);
        assert_eq!(c.messages[1].id.as_deref(), Some("11"));
        assert_eq!(c.messages[2].role, Role::Unknown);
    }

    #[test]
    fn request_serializes_null_conversation() {
        let req = ChatStreamRequest {
            message: "hi".into(),
            dify_app_id: 2,
            conversation_id: None,
        };
        let v: Value = serde_json::to_value(&req).unwrap();
        assert!(v.get("conversation_id").unwrap().is_null());
        assert_eq!(v["dify_app_id"], 2);
    }

    #[test]
    fn id_from_value_shapes() {
        assert_eq!(id_from_value(&serde_json::json!(42)), Some("42".into()));
        assert_eq!(id_from_value(&serde_json::json!("abc")), Some("abc".into()));
        assert_eq!(id_from_value(&serde_json::json!("")), None);
        assert_eq!(id_from_value(&Value::Null), None);
    }

    #[test]
    fn truncate_respects_char_boundary() {
        let s = "会話テスト";
        let t = truncate_utf8(s, 4);
        assert_eq!(t, "会");
    }
}
