//! Conversation Buffer
//!
//! Holds the ordered message history plus the single in-progress message
//! being assembled from stream frames.
//!
//! # Design Philosophy
//!
//! The buffer is owned by the session controller and mutated synchronously
//! from its event loop; no other actor touches it while a streaming
//! message is open. At most one message is in progress at any time, and
//! every other message is finalized. Misuse (opening a second streaming
//! message, appending with none open) is an explicit error, not a silent
//! no-op.

use thiserror::Error;

use crate::messages::{Message, MessageId, RequestPayload, Role, WireMessage};

/// Buffer misuse errors
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// `begin_streaming` while a streaming message is already open
    #[error("a streaming message is already in progress")]
    StreamingInProgress,
    /// Append or finalize with no streaming message open
    #[error("no streaming message is in progress")]
    NoStreamingMessage,
}

/// Ordered conversation history with one optional in-progress message
#[derive(Clone, Debug, Default)]
pub struct ConversationBuffer {
    messages: Vec<Message>,
    streaming_id: Option<MessageId>,
}

impl ConversationBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finalized message
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> MessageId {
        let msg = Message::new(role, content.into());
        let id = msg.id.clone();
        self.messages.push(msg);
        id
    }

    /// Open the in-progress message for a streaming response
    pub fn begin_streaming(&mut self, role: Role) -> Result<MessageId, BufferError> {
        if self.streaming_id.is_some() {
            return Err(BufferError::StreamingInProgress);
        }
        let msg = Message::streaming(role);
        let id = msg.id.clone();
        self.streaming_id = Some(id.clone());
        self.messages.push(msg);
        Ok(id)
    }

    /// Append delta text to the open message
    ///
    /// Returns the full accumulated content, which is what the render sink
    /// receives so that a full re-render is always possible.
    pub fn append_to_streaming(&mut self, delta: &str) -> Result<&str, BufferError> {
        let id = self
            .streaming_id
            .as_ref()
            .ok_or(BufferError::NoStreamingMessage)?;
        let msg = self
            .messages
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or(BufferError::NoStreamingMessage)?;
        msg.append(delta);
        Ok(msg.content.as_str())
    }

    /// Close the open message, making it immutable, and return its content
    pub fn finalize_streaming(&mut self) -> Result<String, BufferError> {
        let id = self
            .streaming_id
            .take()
            .ok_or(BufferError::NoStreamingMessage)?;
        let msg = self
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(BufferError::NoStreamingMessage)?;
        msg.complete();
        Ok(msg.content.clone())
    }

    /// Drop the open message entirely (cancellation path)
    pub fn discard_streaming(&mut self) {
        if let Some(id) = self.streaming_id.take() {
            self.messages.retain(|m| m.id != id);
        }
    }

    /// Close the open message but flag it as failed, keeping whatever
    /// partial content it had. Returns that content.
    pub fn mark_streaming_failed(&mut self) -> Option<String> {
        let id = self.streaming_id.take()?;
        let msg = self.messages.iter_mut().find(|m| m.id == id)?;
        msg.complete();
        msg.failed = true;
        Some(msg.content.clone())
    }

    /// Whether a streaming message is open
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming_id.is_some()
    }

    /// Ordered snapshot of the conversation
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// All messages, in order
    #[must_use]
    pub fn all_messages(&self) -> &[Message] {
        &self.messages
    }

    /// Build the backend request payload from the finalized history
    ///
    /// Failed partial messages are excluded: they are retained for display
    /// only and are not replayed to the backend.
    #[must_use]
    pub fn request_payload(&self, model: &str) -> RequestPayload {
        RequestPayload {
            model: model.to_string(),
            messages: self
                .messages
                .iter()
                .filter(|m| !m.streaming && !m.failed)
                .map(|m| WireMessage {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect(),
        }
    }

    /// Number of messages, including any in-progress one
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the buffer holds no messages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Clear the history
    pub fn clear(&mut self) {
        self.messages.clear();
        self.streaming_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_snapshot() {
        let mut buffer = ConversationBuffer::new();
        buffer.append(Role::User, "hi");
        buffer.append(Role::Assistant, "hello");

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].role, Role::User);
        assert_eq!(snapshot[1].content, "hello");
    }

    #[test]
    fn test_streaming_lifecycle() {
        let mut buffer = ConversationBuffer::new();
        buffer.append(Role::User, "hi");

        buffer.begin_streaming(Role::Assistant).unwrap();
        assert!(buffer.is_streaming());

        assert_eq!(buffer.append_to_streaming("Hel").unwrap(), "Hel");
        assert_eq!(buffer.append_to_streaming("lo!").unwrap(), "Hello!");

        let content = buffer.finalize_streaming().unwrap();
        assert_eq!(content, "Hello!");
        assert!(!buffer.is_streaming());
        assert_eq!(buffer.all_messages()[1].content, "Hello!");
        assert!(!buffer.all_messages()[1].streaming);
    }

    #[test]
    fn test_only_one_streaming_message() {
        let mut buffer = ConversationBuffer::new();
        buffer.begin_streaming(Role::Assistant).unwrap();
        assert_eq!(
            buffer.begin_streaming(Role::Assistant),
            Err(BufferError::StreamingInProgress)
        );
    }

    #[test]
    fn test_finalized_message_is_immutable() {
        let mut buffer = ConversationBuffer::new();
        buffer.begin_streaming(Role::Assistant).unwrap();
        buffer.append_to_streaming("done").unwrap();
        buffer.finalize_streaming().unwrap();

        assert_eq!(
            buffer.append_to_streaming("more"),
            Err(BufferError::NoStreamingMessage)
        );
        assert_eq!(buffer.all_messages()[0].content, "done");
    }

    #[test]
    fn test_append_without_open_message_fails() {
        let mut buffer = ConversationBuffer::new();
        assert_eq!(
            buffer.append_to_streaming("x"),
            Err(BufferError::NoStreamingMessage)
        );
        assert_eq!(
            buffer.finalize_streaming(),
            Err(BufferError::NoStreamingMessage)
        );
    }

    #[test]
    fn test_discard_streaming_removes_partial() {
        let mut buffer = ConversationBuffer::new();
        buffer.append(Role::User, "hi");
        buffer.begin_streaming(Role::Assistant).unwrap();
        buffer.append_to_streaming("par").unwrap();

        buffer.discard_streaming();
        assert!(!buffer.is_streaming());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_mark_failed_retains_partial() {
        let mut buffer = ConversationBuffer::new();
        buffer.begin_streaming(Role::Assistant).unwrap();
        buffer.append_to_streaming("par").unwrap();

        let partial = buffer.mark_streaming_failed().unwrap();
        assert_eq!(partial, "par");

        let msgs = buffer.all_messages();
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].failed);
        assert!(!msgs[0].streaming);
        assert_eq!(msgs[0].content, "par");
    }

    #[test]
    fn test_payload_excludes_open_and_failed_messages() {
        let mut buffer = ConversationBuffer::new();
        buffer.append(Role::System, "be brief");
        buffer.append(Role::User, "hi");
        buffer.begin_streaming(Role::Assistant).unwrap();
        buffer.append_to_streaming("par").unwrap();
        buffer.mark_streaming_failed();
        buffer.append(Role::User, "again");
        buffer.begin_streaming(Role::Assistant).unwrap();

        let payload = buffer.request_payload("test-model");
        assert_eq!(payload.model, "test-model");
        let contents: Vec<_> = payload.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["be brief", "hi", "again"]);
    }
}
