pub mod config;
pub mod error;
pub mod logging;
pub mod suggestions;
pub mod transcript;

pub use config::{AssistantConfig, Config, EndpointConfig, FileLoggingConfig, LoggingConfig, PrivacySection};
pub use error::{Error, GenerationError, Result};
pub use suggestions::{DEFAULT_SUGGESTIONS, MARQUEE_LEN, greeting, hero_headline, marquee_suggestions};
pub use transcript::{Message, MessageId, Role, Transcript};
