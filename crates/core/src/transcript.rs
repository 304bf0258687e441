//! Conversation transcript for the insights assistant.
//!
//! The transcript only ever grows, one immutable [`Message`] at a time,
//! until it is reset wholesale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque message identifier, unique per process
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single transcript entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message with a fresh id; blank content is rejected
    pub fn new(role: Role, content: impl Into<String>) -> Result<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(Error::Validation(format!("{} message content must not be empty", role)));
        }

        Ok(Self { id: MessageId::new(), role, content, created_at: Utc::now() })
    }

    pub fn user(content: impl Into<String>) -> Result<Self> {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Result<Self> {
        Self::new(Role::Assistant, content)
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// Ordered, append-only-until-reset log of messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message to the end
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Drop every message
    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// Most recently appended user message, if any
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_user())
    }

    /// Ordered `(role, content)` projection used to build outbound requests
    pub fn snapshot_for_request(&self) -> Vec<(Role, String)> {
        self.messages.iter().map(|m| (m.role, m.content.clone())).collect()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_user()).count()
    }

    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(Message::is_user)
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(content: &str) -> Message {
        Message::user(content).unwrap()
    }

    fn assistant(content: &str) -> Message {
        Message::assistant(content).unwrap()
    }

    #[test]
    fn test_transcript_new() {
        let transcript = Transcript::new();
        assert!(transcript.is_empty());
        assert_eq!(transcript.len(), 0);
        assert!(transcript.last_user_message().is_none());
        assert!(!transcript.has_user_message());
    }

    #[test]
    fn test_message_rejects_blank_content() {
        assert!(Message::user("").is_err());
        assert!(Message::assistant("   \n").is_err());
        assert!(matches!(Message::user(" "), Err(Error::Validation(_))));
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = user("hello");
        let b = user("hello");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.content(), b.content());
    }

    #[test]
    fn test_append_preserves_order() {
        let mut transcript = Transcript::new();
        transcript.append(user("one"));
        transcript.append(assistant("two"));
        transcript.append(user("three"));

        let contents: Vec<&str> = transcript.iter().map(Message::content).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(transcript.last().map(Message::role), Some(Role::User));
    }

    #[test]
    fn test_last_user_message_skips_assistant_replies() {
        let mut transcript = Transcript::new();
        transcript.append(user("p"));
        transcript.append(assistant("q"));
        transcript.append(assistant("r"));

        assert_eq!(transcript.last_user_message().map(Message::content), Some("p"));
        assert_eq!(transcript.user_message_count(), 1);
    }

    #[test]
    fn test_snapshot_for_request() {
        let mut transcript = Transcript::new();
        transcript.append(user("hello"));
        transcript.append(assistant("hi"));

        assert_eq!(
            transcript.snapshot_for_request(),
            vec![(Role::User, "hello".to_string()), (Role::Assistant, "hi".to_string())]
        );
    }

    #[test]
    fn test_reset() {
        let mut transcript = Transcript::new();
        transcript.append(user("hello"));
        transcript.reset();

        assert!(transcript.is_empty());
        assert!(transcript.snapshot_for_request().is_empty());
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(Role::Assistant.to_string(), "assistant");
    }
}
