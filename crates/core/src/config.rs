use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::suggestions::DEFAULT_SUGGESTIONS;

/// Route the dashboard serves the insights endpoint on
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:3000/api/ai/insights";

/// Where generation requests are sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    /// Absolute http(s) URL of the answer endpoint
    #[serde(default = "default_endpoint_url")]
    pub url: String,

    /// Client-side timeout; absent means wait until the endpoint settles
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl EndpointConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self { url: default_endpoint_url(), timeout_secs: None, headers: BTreeMap::new() }
    }
}

fn default_endpoint_url() -> String {
    DEFAULT_ENDPOINT_URL.to_string()
}

/// Assistant panel presentation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssistantConfig {
    /// Name used in the greeting headline
    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// Suggested prompts offered while the transcript is empty
    #[serde(default = "default_suggestions")]
    pub suggestions: Vec<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self { display_name: default_display_name(), suggestions: default_suggestions() }
    }
}

fn default_display_name() -> String {
    "Researcher".to_string()
}

fn default_suggestions() -> Vec<String> {
    DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `auto`, `pretty`, `json` or `compact`
    #[serde(default = "default_log_format")]
    pub format: String,

    #[serde(default)]
    pub file: FileLoggingConfig,

    #[serde(default)]
    pub privacy: PrivacySection,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: FileLoggingConfig::default(),
            privacy: PrivacySection::default(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "auto".to_string()
}

/// `[logging.file]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileLoggingConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_file_level")]
    pub level: String,

    /// Number of daily log files kept
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self { enabled: false, level: default_file_level(), max_files: default_max_files() }
    }
}

fn default_file_level() -> String {
    "debug".to_string()
}

fn default_max_files() -> usize {
    5
}

/// `[logging.privacy]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrivacySection {
    /// Include message text in log events
    #[serde(default)]
    pub log_message_content: bool,

    #[serde(default = "default_truncate_length")]
    pub truncate_length: usize,
}

impl Default for PrivacySection {
    fn default() -> Self {
        Self { log_message_content: false, truncate_length: default_truncate_length() }
    }
}

fn default_truncate_length() -> usize {
    200
}

/// Root configuration structure for biosight.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointConfig,

    #[serde(default)]
    pub assistant: AssistantConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML string
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str).map_err(|e| Error::Config(ConfigError::from(e).to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if !is_http_url(&self.endpoint.url) {
            return Err(Error::Config(ConfigError::InvalidEndpointUrl(self.endpoint.url.clone()).to_string()));
        }

        if self.endpoint.timeout_secs == Some(0) {
            return Err(Error::Config(ConfigError::ZeroTimeout.to_string()));
        }

        if self.assistant.display_name.trim().is_empty() {
            return Err(Error::Config(ConfigError::EmptyDisplayName.to_string()));
        }

        if let Some(index) = self.assistant.suggestions.iter().position(|s| s.trim().is_empty()) {
            return Err(Error::Config(ConfigError::EmptySuggestion(index).to_string()));
        }

        Ok(())
    }

    /// Get example configuration (as a string)
    pub fn example() -> &'static str {
        r#"# biosight configuration example

[endpoint]
# Answer endpoint receiving { messages: [...] } and returning { reply } or { insight }
url = "http://localhost:3000/api/ai/insights"
# Client-side timeout in seconds (optional, default: none)
# timeout_secs = 60

# Extra request headers (optional)
# [endpoint.headers]
# x-api-key = "your-key-here"

[assistant]
# Name used in the greeting
display_name = "Researcher"

[logging]
# Level for stderr output: error, warn, info, debug, trace
level = "warn"
# Format: "auto" (pretty on a terminal, compact otherwise), "pretty", "json" or "compact"
format = "auto"

[logging.file]
enabled = false
level = "debug"
max_files = 5

[logging.privacy]
# Include message text in log events
log_message_content = false
truncate_length = 200
"#
    }
}

/// Absolute http(s) URL with a non-empty host and no whitespace
fn is_http_url(raw: &str) -> bool {
    if raw.chars().any(char::is_whitespace) {
        return false;
    }

    match Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|host| !host.is_empty()),
        Err(_) => false,
    }
}

/// Configuration-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Endpoint URL is not an absolute http(s) URL
    #[error("invalid endpoint url: {0}")]
    InvalidEndpointUrl(String),

    #[error("timeout_secs must be greater than zero")]
    ZeroTimeout,

    #[error("display_name must not be empty")]
    EmptyDisplayName,

    #[error("suggestion {0} is empty")]
    EmptySuggestion(usize),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlParse(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::TomlParse(err.to_string())
    }
}
