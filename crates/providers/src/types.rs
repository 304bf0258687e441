use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use biosight_core::{GenerationError, Result, Role};

/// Substituted when a successful response carries no usable reply
pub const FALLBACK_REPLY: &str = "I couldn't generate a response.";

/// Keys checked for the reply text, in precedence order
pub const REPLY_KEYS: [&str; 2] = ["reply", "insight"];

/// A single `(role, content)` pair on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Body POSTed to the answer endpoint: `{ "messages": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightRequest {
    pub messages: Vec<WireMessage>,
}

impl InsightRequest {
    pub fn new(messages: Vec<WireMessage>) -> Self {
        Self { messages }
    }

    /// Build from a transcript projection
    pub fn from_snapshot(snapshot: Vec<(Role, String)>) -> Self {
        Self { messages: snapshot.into_iter().map(|(role, content)| WireMessage { role, content }).collect() }
    }

    /// Content of the final user-role entry
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages.iter().rev().find(|m| m.role == Role::User).map(|m| m.content.as_str())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Which part of the response body the reply came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Reply,
    Insight,
    Fallback,
}

impl ReplySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplySource::Reply => "reply",
            ReplySource::Insight => "insight",
            ReplySource::Fallback => "fallback",
        }
    }
}

/// Reply text extracted from a successful response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightReply {
    pub content: String,
    pub source: ReplySource,
}

impl InsightReply {
    pub fn fallback() -> Self {
        Self { content: FALLBACK_REPLY.to_string(), source: ReplySource::Fallback }
    }

    /// Extract the reply from a decoded JSON body.
    ///
    /// The first of `reply`, `insight` that is present and not null wins.
    /// Non-string values are rendered as JSON text. A blank winner, a
    /// missing reply or a non-object body all yield [`FALLBACK_REPLY`].
    pub fn from_body(body: &Value) -> Self {
        let Some(object) = body.as_object() else {
            return Self::fallback();
        };

        let winner = REPLY_KEYS
            .iter()
            .zip([ReplySource::Reply, ReplySource::Insight])
            .find_map(|(key, source)| match object.get(*key) {
                None | Some(Value::Null) => None,
                Some(Value::String(text)) => Some((text.clone(), source)),
                Some(other) => Some((other.to_string(), source)),
            });

        match winner {
            Some((content, source)) if !content.trim().is_empty() => Self { content, source },
            _ => Self::fallback(),
        }
    }

    /// Decode a raw response body and extract the reply
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let body: Value = serde_json::from_slice(bytes).map_err(|e| GenerationError::malformed(e.to_string()))?;
        Ok(Self::from_body(&body))
    }

    pub fn is_fallback(&self) -> bool {
        self.source == ReplySource::Fallback
    }
}

/// Token for cancelling an in-flight generation
///
/// Clones share state: cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    pub fn new() -> Self {
        Self { inner: CancellationToken::new() }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }
}
