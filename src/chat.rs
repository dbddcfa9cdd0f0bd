//! Chat message records
//!
//! Plain ordered records the UI layer renders. A message is mutated in place
//! while its response is streaming and frozen once generation ends; identity
//! for list diffing is `(timestamp, sender)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Originator of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageSender {
    User,
    Assistant,
    System,
}

/// One message in the conversation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: MessageSender,
    pub content: String,
    /// True while the assistant response is still being generated
    pub is_streaming: bool,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Creates a user message (frozen on creation).
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            sender: MessageSender::User,
            content: content.into(),
            is_streaming: false,
            timestamp: Utc::now(),
        }
    }

    /// Creates an empty assistant message that will accumulate chunks.
    pub fn assistant_streaming() -> Self {
        Self {
            sender: MessageSender::Assistant,
            content: String::new(),
            is_streaming: true,
            timestamp: Utc::now(),
        }
    }

    /// Creates a status notice from the core.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            sender: MessageSender::System,
            content: content.into(),
            is_streaming: false,
            timestamp: Utc::now(),
        }
    }

    /// Appends a received chunk while streaming.
    pub fn push_chunk(&mut self, chunk: &str) {
        debug_assert!(self.is_streaming, "chunk pushed to a frozen message");
        self.content.push_str(chunk);
    }

    /// Marks the message complete; it is immutable from here on.
    pub fn freeze(&mut self) {
        self.is_streaming = false;
    }

    /// Diff identity for list rendering.
    pub fn key(&self) -> (DateTime<Utc>, MessageSender) {
        (self.timestamp, self.sender)
    }

    /// Opaque token-count approximation for telemetry only.
    pub fn approx_tokens(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_accumulation_then_freeze() {
        let mut msg = ChatMessage::assistant_streaming();
        assert!(msg.is_streaming);
        assert!(msg.content.is_empty());

        msg.push_chunk("Hello");
        msg.push_chunk(", world");
        msg.freeze();

        assert!(!msg.is_streaming);
        assert_eq!(msg.content, "Hello, world");
        assert_eq!(msg.approx_tokens(), 2);
    }

    #[test]
    fn test_user_and_system_messages_are_frozen() {
        assert!(!ChatMessage::user("hi").is_streaming);
        assert!(!ChatMessage::system("Model ready").is_streaming);
    }

    #[test]
    fn test_key_distinguishes_senders_at_same_instant() {
        let user = ChatMessage::user("hi");
        let mut system = ChatMessage::system("notice");
        system.timestamp = user.timestamp;
        assert_ne!(user.key(), system.key());
    }
}
