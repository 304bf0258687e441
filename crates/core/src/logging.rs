//! Logging setup built on the tracing ecosystem.
//!
//! # Environment Variables
//!
//! - `BIOSIGHT_LOG`: Filter directive (like `RUST_LOG`), e.g., `biosight_agent=debug`
//! - `BIOSIGHT_LOG_FORMAT`: Output format for stderr: `pretty`, `json`, `compact`
//! - `BIOSIGHT_LOG_DIR`: Directory for file logs (default `~/.biosight/logs/`)
//!
//! # Configuration
//!
//! Logging is configured via the `[logging]` section in `biosight.toml`:
//!
//! ```toml
//! [logging]
//! level = "warn"
//! format = "auto"
//!
//! [logging.file]
//! enabled = false
//! level = "debug"
//! max_files = 5
//!
//! [logging.privacy]
//! log_message_content = false
//! truncate_length = 200
//! ```
//!
//! # Example
//!
//! ```no_run
//! use biosight_core::logging;
//!
//! let _guard = logging::init_logging(None)?;
//! # Ok::<(), biosight_core::Error>(())
//! ```

use crate::Error;
use crate::config::{FileLoggingConfig, LoggingConfig as ConfigLoggingConfig};
use std::env;
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format for stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Pretty, human-readable output with colors (default for TTY)
    #[default]
    Pretty,
    /// JSON output (one line per event)
    Json,
    /// Compact, single-line output
    Compact,
}

impl LogFormat {
    /// All available log formats.
    pub const VALUES: &[LogFormat] = &[LogFormat::Pretty, LogFormat::Json, LogFormat::Compact];

    /// Parse a log format from a string.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
        }
    }
}

/// Logging configuration wrapper that bridges config and logging modules.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default log level for stderr output.
    pub level: String,
    /// Output format for stderr; `None` picks one from the terminal.
    pub format: Option<LogFormat>,
    /// File logging configuration (optional).
    pub file: Option<FileLoggingConfig>,
    /// Privacy controls for message content.
    pub privacy: PrivacyConfig,
}

/// Privacy configuration for conversation content in logs.
#[derive(Debug, Clone, Default)]
pub struct PrivacyConfig {
    /// Include message text in log events.
    pub log_message_content: bool,
    /// Maximum length for logged content.
    pub truncate_length: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "warn".to_string(), format: None, file: None, privacy: PrivacyConfig::default() }
    }
}

impl From<ConfigLoggingConfig> for LoggingConfig {
    fn from(config: ConfigLoggingConfig) -> Self {
        Self {
            level: config.level,
            format: LogFormat::parse_str(&config.format),
            file: if config.file.enabled { Some(config.file) } else { None },
            privacy: PrivacyConfig {
                log_message_content: config.privacy.log_message_content,
                truncate_length: config.privacy.truncate_length,
            },
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_file_logging(mut self, config: FileLoggingConfig) -> Self {
        self.file = Some(config);
        self
    }

    pub fn with_privacy(mut self, config: PrivacyConfig) -> Self {
        self.privacy = config;
        self
    }

    /// Build an EnvFilter from this config and environment variables.
    fn build_env_filter(&self) -> EnvFilter {
        let filter = env::var("BIOSIGHT_LOG")
            .ok()
            .or_else(|| env::var("RUST_LOG").ok())
            .unwrap_or_else(|| self.level.clone());

        EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(&self.level))
    }

    fn is_tty() -> bool {
        atty::is(atty::Stream::Stderr)
    }

    /// Determine the format for stderr output.
    fn detect_format(&self) -> LogFormat {
        if let Ok(fmt_str) = env::var("BIOSIGHT_LOG_FORMAT")
            && let Some(fmt) = LogFormat::parse_str(&fmt_str)
        {
            return fmt;
        }

        if let Some(format) = self.format {
            return format;
        }

        if Self::is_tty() { LogFormat::Pretty } else { LogFormat::Compact }
    }

    fn get_log_dir() -> Result<PathBuf, Error> {
        if let Ok(custom_dir) = env::var("BIOSIGHT_LOG_DIR") {
            return Ok(PathBuf::from(custom_dir));
        }

        let home = env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .map_err(|_| Error::Config("Could not determine home directory".to_string()))?;

        Ok(PathBuf::from(home).join(".biosight").join("logs"))
    }
}

/// Initialize the global tracing subscriber.
///
/// Sets up stderr output filtered by `BIOSIGHT_LOG`/`RUST_LOG` (falling back
/// to the configured level) and, when file logging is enabled, a daily
/// rolling JSON log filtered by the file level.
///
/// The returned guard must be held for as long as file logs should be
/// written; dropping it flushes and stops the background writer.
pub fn init_logging(config: Option<LoggingConfig>) -> Result<Option<WorkerGuard>, Error> {
    let config = config.unwrap_or_default();
    let env_filter = config.build_env_filter();
    let format = config.detect_format();

    let stderr_layer = match format {
        LogFormat::Pretty => fmt::layer().pretty().with_writer(io::stderr).with_ansi(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(io::stderr).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_writer(io::stderr).boxed(),
    };

    let registry = Registry::default().with(stderr_layer.with_filter(env_filter));

    if let Some(file_config) = &config.file {
        let log_dir = LoggingConfig::get_log_dir()?;
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| Error::Config(format!("Failed to create log directory: {}", e)))?;

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("biosight")
            .filename_suffix("log")
            .max_log_files(file_config.max_files.max(1))
            .build(&log_dir)
            .map_err(|e| Error::Config(format!("Failed to create log file: {}", e)))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_filter = EnvFilter::try_new(&file_config.level).unwrap_or_else(|_| EnvFilter::new("debug"));
        registry
            .with(fmt::layer().json().with_writer(non_blocking).with_filter(file_filter))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to install log subscriber: {}", e)))?;

        return Ok(Some(guard));
    }

    registry
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to install log subscriber: {}", e)))?;

    Ok(None)
}

/// Render message content for a log field according to privacy settings.
pub fn redact_content(content: &str, privacy: &PrivacyConfig) -> String {
    if !privacy.log_message_content {
        return format!("[REDACTED {} chars]", content.chars().count());
    }

    let total = content.chars().count();
    if total <= privacy.truncate_length {
        return content.to_string();
    }

    let mut truncated = content.chars().take(privacy.truncate_length).collect::<String>();
    truncated.push_str("...");
    truncated.push_str(&format!(" ({} total chars)", total));
    truncated
}
