pub mod adapter;
pub mod mock;
pub mod types;

pub use adapter::{EndpointFactory, HttpEndpoint, InsightsEndpoint};
pub use mock::{ScriptedEndpoint, ScriptedResponse};
pub use types::{CancelToken, FALLBACK_REPLY, InsightReply, InsightRequest, REPLY_KEYS, ReplySource, WireMessage};

pub use biosight_core::{Error, GenerationError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use biosight_core::Role;

    #[test]
    fn test_request_round_trip_shape() {
        let request = InsightRequest::from_snapshot(vec![(Role::User, "hello".to_string())]);
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"messages":[{"role":"user","content":"hello"}]}"#);
    }

    #[test]
    fn test_reply_keys_precedence() {
        assert_eq!(REPLY_KEYS, ["reply", "insight"]);
    }

    #[test]
    fn test_fallback_literal() {
        assert_eq!(FALLBACK_REPLY, "I couldn't generate a response.");
        assert_eq!(InsightReply::fallback().content, FALLBACK_REPLY);
    }
}
