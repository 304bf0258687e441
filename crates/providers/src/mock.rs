use crate::InsightsEndpoint;
use crate::types::*;
use biosight_core::{GenerationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted outcome for one generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScriptedResponse {
    /// 2xx with `{ "reply": content }`
    Reply {
        content: String,
        #[serde(default)]
        delay_ms: u64,
    },
    /// 2xx with an arbitrary JSON body
    Json {
        body: serde_json::Value,
        #[serde(default)]
        delay_ms: u64,
    },
    /// Non-2xx status
    Status {
        status: u16,
        #[serde(default)]
        body: String,
        #[serde(default)]
        delay_ms: u64,
    },
    /// Network failure
    Transport {
        message: String,
        #[serde(default)]
        delay_ms: u64,
    },
    /// 2xx with a body that is not JSON
    Malformed {
        body: String,
        #[serde(default)]
        delay_ms: u64,
    },
}

impl ScriptedResponse {
    pub fn reply(content: impl Into<String>) -> Self {
        Self::Reply { content: content.into(), delay_ms: 0 }
    }

    pub fn json(body: serde_json::Value) -> Self {
        Self::Json { body, delay_ms: 0 }
    }

    pub fn status(status: u16) -> Self {
        Self::Status { status, body: String::new(), delay_ms: 0 }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into(), delay_ms: 0 }
    }

    /// Same response, settling after `delay`
    pub fn delayed(mut self, delay: Duration) -> Self {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        match &mut self {
            Self::Reply { delay_ms, .. }
            | Self::Json { delay_ms, .. }
            | Self::Status { delay_ms, .. }
            | Self::Transport { delay_ms, .. }
            | Self::Malformed { delay_ms, .. } => *delay_ms = ms,
        }
        self
    }

    pub fn delay(&self) -> Duration {
        match self {
            Self::Reply { delay_ms, .. }
            | Self::Json { delay_ms, .. }
            | Self::Status { delay_ms, .. }
            | Self::Transport { delay_ms, .. }
            | Self::Malformed { delay_ms, .. } => Duration::from_millis(*delay_ms),
        }
    }

    fn settle(self) -> Result<InsightReply> {
        match self {
            Self::Reply { content, .. } => Ok(InsightReply::from_body(&serde_json::json!({ "reply": content }))),
            Self::Json { body, .. } => Ok(InsightReply::from_body(&body)),
            Self::Status { status, body, .. } => Err(GenerationError::status(status, body).into()),
            Self::Transport { message, .. } => Err(GenerationError::transport(message).into()),
            Self::Malformed { body, .. } => InsightReply::from_slice(body.as_bytes()),
        }
    }
}

/// Script file format
#[derive(Debug, Deserialize)]
struct ScriptConfig {
    responses: Vec<ScriptedResponse>,
}

/// Endpoint answering from a fixed script, for tests and offline use
pub struct ScriptedEndpoint {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<InsightRequest>>,
    honor_cancellation: bool,
}

impl ScriptedEndpoint {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self { responses: Mutex::new(responses.into()), requests: Mutex::new(Vec::new()), honor_cancellation: true }
    }

    /// Load a script from a TOML file with a `[[responses]]` array
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: ScriptConfig = toml::from_str(&content)
            .map_err(|e| biosight_core::Error::Parse(format!("Failed to parse scripted responses: {}", e)))?;
        Ok(Self::new(config.responses))
    }

    /// Keep running after cancellation, like a remote that never notices the abort
    pub fn ignoring_cancellation(mut self) -> Self {
        self.honor_cancellation = false;
        self
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<InsightRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or_default()
    }

    fn next_response(&self, request: InsightRequest) -> ScriptedResponse {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let next = self.responses.lock().ok().and_then(|mut r| r.pop_front());
        next.unwrap_or_else(|| {
            tracing::warn!("scripted endpoint exhausted");
            ScriptedResponse::reply("No more scripted responses configured")
        })
    }
}

#[async_trait::async_trait]
impl InsightsEndpoint for ScriptedEndpoint {
    async fn generate(&self, request: InsightRequest, cancel_token: CancelToken) -> Result<InsightReply> {
        let response = self.next_response(request);
        let delay = response.delay();

        if self.honor_cancellation {
            if cancel_token.is_cancelled() {
                return Err(GenerationError::Cancelled.into());
            }

            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => return Err(GenerationError::Cancelled.into()),
                _ = tokio::time::sleep(delay) => {}
            }
        } else {
            tokio::time::sleep(delay).await;
        }

        response.settle()
    }
}
