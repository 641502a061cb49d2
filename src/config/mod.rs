//! Appender configuration: value types, a fluent builder and INI loading.

mod builder;
mod ini_source;
mod types;

pub use builder::AppenderConfigBuilder;
pub use types::{
    APP_ID_PLACEHOLDER, AppenderConfig, AuthConfig, ConfigError, CrashUploadConfig,
    DEFAULT_CRASH_UPLOAD_URL, DEFAULT_MAX_CRASH_LOG_BYTES, DEFAULT_QUEUE_CAPACITY, Destination,
    JSON_CONTENT_TYPE, JsonPostConfig, MAX_OPTIONAL_FIELD_CHARS, MAX_QUEUE_CAPACITY,
};
