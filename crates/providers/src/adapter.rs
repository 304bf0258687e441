use reqwest::Client as HttpClient;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::Duration;

use crate::types::*;
use biosight_core::{EndpointConfig, Error, GenerationError, Result};

/// An answer-generating endpoint
///
/// Implementations settle each call exactly once: with a reply, with a
/// [`GenerationError`], or with [`GenerationError::Cancelled`] once the
/// token is cancelled.
#[async_trait::async_trait]
pub trait InsightsEndpoint: Send + Sync {
    /// Send the full conversation and wait for a single reply
    async fn generate(&self, request: InsightRequest, cancel_token: CancelToken) -> Result<InsightReply>;
}

/// HTTP implementation posting JSON to a single URL
pub struct HttpEndpoint {
    client: HttpClient,
    url: String,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl HttpEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: HttpClient::new(), url: url.into(), headers: HeaderMap::new(), timeout: None }
    }

    pub fn from_config(config: &EndpointConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("invalid value for header '{}': {}", name, e)))?;
            headers.insert(name, value);
        }

        Ok(Self { client: HttpClient::new(), url: config.url.clone(), headers, timeout: config.timeout() })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, request: &InsightRequest) -> Result<InsightReply> {
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| GenerationError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::status(status.as_u16(), body).into());
        }

        let bytes = response.bytes().await.map_err(|e| GenerationError::transport(e.to_string()))?;
        InsightReply::from_slice(&bytes)
    }

    async fn send_with_timeout(&self, request: &InsightRequest) -> Result<InsightReply> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.send(request))
                .await
                .map_err(|_| GenerationError::Timeout(limit))?,
            None => self.send(request).await,
        }
    }
}

#[async_trait::async_trait]
impl InsightsEndpoint for HttpEndpoint {
    async fn generate(&self, request: InsightRequest, cancel_token: CancelToken) -> Result<InsightReply> {
        if cancel_token.is_cancelled() {
            return Err(GenerationError::Cancelled.into());
        }

        tracing::debug!(url = %self.url, messages = request.len(), "posting insight request");

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => Err(GenerationError::Cancelled.into()),
            result = self.send_with_timeout(&request) => result,
        }
    }
}

/// Factory to create endpoints from config
pub struct EndpointFactory;

impl EndpointFactory {
    pub fn create_from_config(config: &EndpointConfig) -> Result<Arc<dyn InsightsEndpoint>> {
        Ok(Arc::new(HttpEndpoint::from_config(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_http_endpoint_creation() {
        let endpoint = HttpEndpoint::new("http://localhost:3000/api/ai/insights");
        assert_eq!(endpoint.url(), "http://localhost:3000/api/ai/insights");
        assert!(endpoint.timeout.is_none());
        assert!(endpoint.headers.is_empty());
    }

    #[test]
    fn test_http_endpoint_from_config() {
        let mut headers = BTreeMap::new();
        headers.insert("x-api-key".to_string(), "secret".to_string());
        let config = EndpointConfig { url: "https://example.org/insights".to_string(), timeout_secs: Some(5), headers };

        let endpoint = HttpEndpoint::from_config(&config).unwrap();
        assert_eq!(endpoint.url(), "https://example.org/insights");
        assert_eq!(endpoint.timeout, Some(Duration::from_secs(5)));
        assert_eq!(endpoint.headers.get("x-api-key").unwrap(), "secret");
    }

    #[test]
    fn test_http_endpoint_rejects_bad_header() {
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_string(), "value".to_string());
        let config = EndpointConfig { headers, ..Default::default() };

        let result = HttpEndpoint::from_config(&config);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_with_timeout() {
        let endpoint = HttpEndpoint::new("http://localhost").with_timeout(Duration::from_millis(250));
        assert_eq!(endpoint.timeout, Some(Duration::from_millis(250)));
    }

    #[tokio::test]
    async fn test_generate_pre_cancelled() {
        let endpoint = HttpEndpoint::new("http://127.0.0.1:9/unreachable");
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = endpoint.generate(InsightRequest::default(), cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
