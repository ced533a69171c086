//! Conversation Messages
//!
//! Message types shared between the conversation buffer, the session
//! controller, and the chat backend wire format.
//!
//! # Design Philosophy
//!
//! Messages are append-only: once a message is finalized it never changes.
//! The single exception is the in-progress assistant message that is being
//! assembled from stream frames, which is mutable-by-append until the
//! stream terminates. The `streaming` flag records which state a message
//! is in.

use serde::{Deserialize, Serialize};

/// Message identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("msg_{id}"))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// User input
    User,
    /// AI assistant reply
    Assistant,
}

impl Role {
    /// Human-readable label
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A message in the conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message
    pub role: Role,
    /// Message content
    pub content: String,
    /// When the message was created (Unix timestamp ms)
    pub timestamp: u64,
    /// Whether the message is still being streamed
    pub streaming: bool,
    /// Whether the stream behind this message failed before completing.
    /// Failed messages keep their partial content for user visibility.
    #[serde(default)]
    pub failed: bool,
}

impl Message {
    /// Create a new finalized message
    pub fn new(role: Role, content: String) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content,
            timestamp: now_ms(),
            streaming: false,
            failed: false,
        }
    }

    /// Create a new streaming message (content will be appended to)
    pub fn streaming(role: Role) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: String::new(),
            timestamp: now_ms(),
            streaming: true,
            failed: false,
        }
    }

    /// Append content to a streaming message
    pub fn append(&mut self, text: &str) {
        self.content.push_str(text);
    }

    /// Mark streaming as complete
    pub fn complete(&mut self) {
        self.streaming = false;
    }
}

/// One message in the backend wire format
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WireMessage {
    /// Message role (lowercase on the wire)
    pub role: Role,
    /// Message content
    pub content: String,
}

/// Request payload for the backend chat endpoint
///
/// Built from a conversation snapshot at submit time and owned by the
/// controller for the duration of one turn. Never mutated after dispatch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestPayload {
    /// Model identifier
    pub model: String,
    /// Conversation snapshot (finalized messages only)
    pub messages: Vec<WireMessage>,
}

/// Get current timestamp in milliseconds
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_unique() {
        let id1 = MessageId::new();
        let id2 = MessageId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let json = serde_json::to_string(&Role::User).unwrap();
        assert_eq!(json, "\"user\"");
    }

    #[test]
    fn test_payload_wire_shape() {
        let payload = RequestPayload {
            model: "gpt-4.1-mini".to_string(),
            messages: vec![WireMessage {
                role: Role::User,
                content: "hi".to_string(),
            }],
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "gpt-4.1-mini",
                "messages": [{"role": "user", "content": "hi"}],
            })
        );
    }

    #[test]
    fn test_streaming_message_lifecycle() {
        let mut msg = Message::streaming(Role::Assistant);
        assert!(msg.streaming);
        assert!(msg.content.is_empty());

        msg.append("Hel");
        msg.append("lo!");
        assert_eq!(msg.content, "Hello!");

        msg.complete();
        assert!(!msg.streaming);
    }
}
