//! Conversation records
//!
//! The interpreter turns every backend response into a [`ChatMessage`]. The
//! message carries text only; widget content lives in the surface store and
//! is referenced through `surface_id`. Widgets talk back to the backend with
//! [`ChatEvent`]s.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Label used when a response names no agent
pub const DEFAULT_AGENT: &str = "GENESIS";

/// Message identifier (`msg-<n>-<unix ms>`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID stamped with `now_ms`
    #[must_use]
    pub fn new(now_ms: u64) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("msg-{id}-{now_ms}"))
    }

    /// Borrow the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who said it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The human
    User,
    /// An agent
    Assistant,
}

/// One conversation turn
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unique id
    pub id: MessageId,
    /// Speaker
    pub role: MessageRole,
    /// Message text
    pub text: String,
    /// Agent label (assistant turns only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// First `stream`-zone surface created while handling this turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_id: Option<String>,
    /// RFC 3339 timestamp
    pub timestamp: String,
}

impl ChatMessage {
    /// Assistant turn stamped at `now_ms`
    #[must_use]
    pub fn assistant(
        text: impl Into<String>,
        agent: impl Into<String>,
        surface_id: Option<String>,
        now_ms: u64,
    ) -> Self {
        Self {
            id: MessageId::new(now_ms),
            role: MessageRole::Assistant,
            text: text.into(),
            agent: Some(agent.into()),
            surface_id,
            timestamp: rfc3339(now_ms),
        }
    }

    /// User turn stamped at `now_ms`
    #[must_use]
    pub fn user_at(text: impl Into<String>, now_ms: u64) -> Self {
        Self {
            id: MessageId::new(now_ms),
            role: MessageRole::User,
            text: text.into(),
            agent: None,
            surface_id: None,
            timestamp: rfc3339(now_ms),
        }
    }

    /// User turn stamped with the system clock
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::user_at(text, crate::clock::now_ms())
    }

    /// Whether a widget surface is attached to this turn
    #[must_use]
    pub fn has_surface(&self) -> bool {
        self.surface_id.is_some()
    }
}

fn rfc3339(now_ms: u64) -> String {
    let at = i64::try_from(now_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default();
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Macro-action a widget sends back to the backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Action name, e.g. `start_workout`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Action context
    pub payload: Map<String, Value>,
}

/// Build a widget event
///
/// `surface_id`, when given, is added to the payload under `surfaceId` and
/// wins over a context key of the same name.
#[must_use]
pub fn widget_event(
    action: impl Into<String>,
    context: Map<String, Value>,
    surface_id: Option<&str>,
) -> ChatEvent {
    let mut payload = context;
    if let Some(id) = surface_id.filter(|id| !id.is_empty()) {
        payload.insert("surfaceId".to_string(), Value::String(id.to_string()));
    }
    ChatEvent {
        event_type: action.into(),
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_ids_are_unique() {
        let a = MessageId::new(5);
        let b = MessageId::new(5);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("msg-"));
        assert!(a.as_str().ends_with("-5"));
    }

    #[test]
    fn test_assistant_message_shape() {
        let msg = ChatMessage::assistant("Ready?", "SPARK", Some("s1".into()), 1_700_000_000_000);
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["role"], "assistant");
        assert_eq!(value["agent"], "SPARK");
        assert_eq!(value["surfaceId"], "s1");
        assert_eq!(value["timestamp"], "2023-11-14T22:13:20.000Z");
        assert!(msg.has_surface());
    }

    #[test]
    fn test_user_message_has_no_agent() {
        let msg = ChatMessage::user("hello");
        assert_eq!(msg.role, MessageRole::User);
        assert!(msg.agent.is_none());
        assert!(!msg.has_surface());
    }

    #[test]
    fn test_widget_event_merges_surface_id() {
        let context = json!({"workoutId": "w1", "surfaceId": "stale"});
        let event = widget_event("start_workout", context.as_object().cloned().unwrap(), Some("s9"));

        assert_eq!(event.event_type, "start_workout");
        assert_eq!(event.payload["workoutId"], "w1");
        assert_eq!(event.payload["surfaceId"], "s9");

        let event = widget_event("skip", Map::new(), None);
        assert!(event.payload.is_empty());
    }
}
