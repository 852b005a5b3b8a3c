//! UI-agnostic chat state
//!
//! The message log and status enums are owned by the chat session and read
//! by whatever renders them. Nothing here depends on a UI framework.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
        }
    }

    /// Empty assistant messages are in-progress placeholders and never shown.
    pub fn is_visible(&self) -> bool {
        !(self.role == ChatRole::Assistant && self.content.is_empty())
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// Where the current exchange stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Connecting,
    Sending,
    Streaming,
}

impl SessionStatus {
    pub fn is_busy(&self) -> bool {
        !matches!(self, SessionStatus::Idle)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Sending => "sending",
            SessionStatus::Streaming => "streaming",
        }
    }
}

/// Ordered message history. Insertion order is display order.
///
/// Only the trailing element is ever mutated, and only when it is an
/// assistant message.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::new(ChatRole::User, content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::new(ChatRole::Assistant, content));
    }

    pub fn push_system(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::new(ChatRole::System, content));
    }

    /// Extend the trailing assistant message in place, keeping its id, or
    /// start a new one holding `chunk`.
    pub fn append_fragment(&mut self, chunk: &str) {
        match self.trailing_assistant_mut() {
            Some(last) => last.content.push_str(chunk),
            None => self.push_assistant(chunk),
        }
    }

    /// Remove the trailing message if it is an assistant message with no
    /// content. Returns whether a message was removed.
    pub fn drop_if_empty_trailing_assistant(&mut self) -> bool {
        let empty = self
            .messages
            .last()
            .is_some_and(|m| m.role == ChatRole::Assistant && m.content.is_empty());
        if empty {
            self.messages.pop();
        }
        empty
    }

    pub fn replace_trailing_assistant_content(&mut self, content: impl Into<String>) {
        let content = content.into();
        match self.trailing_assistant_mut() {
            Some(last) => last.content = content,
            None => self.push_assistant(content),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn visible(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.is_visible())
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn trailing_assistant_mut(&mut self) -> Option<&mut ChatMessage> {
        self.messages
            .last_mut()
            .filter(|m| m.role == ChatRole::Assistant)
    }
}
