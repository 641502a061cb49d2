//! Configuration values consumed by [`HttpAppender`](crate::HttpAppender).
//!
//! Values are plain data: nothing is checked until
//! [`HttpAppender::start`](crate::HttpAppender::start) calls
//! [`AppenderConfig::validate`] and builds the request strategy.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    client::{ClientTimeouts, StatusRange},
    filters::LevelFilter,
    level::ParseLevelError,
    rate_limited_warner::DEFAULT_WARN_INTERVAL,
};

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
/// Largest accepted queue capacity. The buffer is allocated up front.
pub const MAX_QUEUE_CAPACITY: usize = 1 << 20;
/// Placeholder substituted with the app id in crash upload URLs.
pub const APP_ID_PLACEHOLDER: &str = "{APPID}";
/// Crash upload endpoint used when no URL is configured.
pub const DEFAULT_CRASH_UPLOAD_URL: &str =
    "https://rink.hockeyapp.net/api/2/apps/{APPID}/crashes/upload";
/// Largest crash log accepted by the crash upload API.
pub const DEFAULT_MAX_CRASH_LOG_BYTES: usize = 200 * 1024;
/// Longest accepted `user_id` / `contact` value, in characters.
pub const MAX_OPTIONAL_FIELD_CHARS: usize = 255;
/// Content type used by the JSON-POST variant unless overridden.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Errors raised while assembling or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was not supplied.
    #[error("{0} must be set")]
    MissingField(&'static str),
    /// A level name outside the supported set.
    #[error("invalid logging level: {0}")]
    InvalidLevel(#[from] ParseLevelError),
    /// A field holds a value outside its accepted range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    /// The INI source could not be read or parsed.
    #[error("failed to load INI configuration: {0}")]
    Ini(String),
    /// The requested INI section does not exist.
    #[error("INI section [{0}] not found")]
    MissingSection(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Authentication applied to the GET and JSON-POST variants.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AuthConfig {
    #[default]
    None,
    /// HTTP Basic authentication.
    Basic { username: String, password: String },
    /// Bearer token authentication.
    Bearer { token: String },
}

/// Settings for the JSON-POST variant.
#[derive(Clone, Debug, PartialEq)]
pub struct JsonPostConfig {
    /// Static members of every request body.
    pub fields: Map<String, Value>,
    /// When set, the record message is stored under this key.
    pub message_field: Option<String>,
    pub content_type: String,
}

impl Default for JsonPostConfig {
    fn default() -> Self {
        Self {
            fields: Map::new(),
            message_field: None,
            content_type: JSON_CONTENT_TYPE.to_owned(),
        }
    }
}

impl JsonPostConfig {
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_message_field(mut self, key: impl Into<String>) -> Self {
        self.message_field = Some(key.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// Settings for the multipart crash upload variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrashUploadConfig {
    /// Sent in the `X-HockeyAppToken` header (required).
    pub api_token: Option<String>,
    /// Substituted for [`APP_ID_PLACEHOLDER`] in the URL (required).
    pub app_id: Option<String>,
    /// `Package:` header of the crash log (required).
    pub package_name: Option<String>,
    pub version: Option<String>,
    pub os: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    /// Sent as the `userID` part; ignored above 255 characters.
    pub user_id: Option<String>,
    /// Sent as the `contact` part; ignored above 255 characters.
    pub contact: Option<String>,
    /// Attach the `description` part.
    pub include_description: bool,
    /// Byte budget for the generated crash log.
    pub max_crash_log_bytes: usize,
    /// Directory for generated attachments; the system temp dir if unset.
    pub attachment_dir: Option<PathBuf>,
}

impl Default for CrashUploadConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            app_id: None,
            package_name: None,
            version: None,
            os: None,
            manufacturer: None,
            model: None,
            user_id: None,
            contact: None,
            include_description: true,
            max_crash_log_bytes: DEFAULT_MAX_CRASH_LOG_BYTES,
            attachment_dir: None,
        }
    }
}

/// Which request strategy the appender uses.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Destination {
    /// Bodiless GET to the configured URL.
    #[default]
    Get,
    /// POST with a JSON body.
    JsonPost(JsonPostConfig),
    /// Multipart crash upload with generated attachment files.
    CrashUpload(CrashUploadConfig),
}

impl Destination {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::JsonPost(_) => "json",
            Self::CrashUpload(_) => "crash",
        }
    }
}

/// Complete appender configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct AppenderConfig {
    /// Name used to prefix diagnostics.
    pub name: String,
    /// Target URL. Optional only for [`Destination::CrashUpload`], which
    /// falls back to [`DEFAULT_CRASH_UPLOAD_URL`].
    pub url: Option<String>,
    pub destination: Destination,
    /// Queue capacity; zero selects rendezvous hand-off.
    pub queue_capacity: usize,
    /// Inclusive range of status codes counted as delivered.
    pub success_status: StatusRange,
    /// Levels to deliver. All disabled by default.
    pub levels: LevelFilter,
    pub auth: AuthConfig,
    /// Extra headers sent with every request.
    pub headers: HashMap<String, String>,
    pub timeouts: ClientTimeouts,
    /// Interval between dropped-record warnings.
    pub warn_interval: Duration,
}

impl Default for AppenderConfig {
    fn default() -> Self {
        Self {
            name: "HttpAppender".to_owned(),
            url: None,
            destination: Destination::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            success_status: StatusRange::default(),
            levels: LevelFilter::default(),
            auth: AuthConfig::default(),
            headers: HashMap::new(),
            timeouts: ClientTimeouts::default(),
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

impl AppenderConfig {
    /// URL the request strategy starts from, before any placeholder
    /// substitution.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingField`] when no URL is configured and the
    /// destination has no default.
    pub fn request_url(&self) -> Result<&str, ConfigError> {
        match (self.url.as_deref(), &self.destination) {
            (Some(url), _) if !url.trim().is_empty() => Ok(url),
            (Some(_), _) => Err(ConfigError::invalid("url", "must not be empty")),
            (None, Destination::CrashUpload(_)) => Ok(DEFAULT_CRASH_UPLOAD_URL),
            (None, _) => Err(ConfigError::MissingField("url")),
        }
    }

    /// Check the destination-independent fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.request_url()?;
        if self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::invalid(
                "queue_capacity",
                format!("{} exceeds {MAX_QUEUE_CAPACITY}", self.queue_capacity),
            ));
        }
        self.success_status.validate()?;
        self.timeouts.validate()?;
        if let Destination::CrashUpload(crash) = &self.destination
            && crash.max_crash_log_bytes == 0
        {
            return Err(ConfigError::invalid(
                "max_crash_log_bytes",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn crash() -> Destination {
        Destination::CrashUpload(CrashUploadConfig::default())
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AppenderConfig::default();
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.success_status, StatusRange { min: 200, max: 299 });
        assert!(config.levels.is_empty());
        assert_eq!(config.timeouts.connect, Duration::from_secs(5));
        assert!(CrashUploadConfig::default().include_description);
    }

    #[test]
    fn url_is_required_for_generic_destinations() {
        let config = AppenderConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField("url"))
        ));
    }

    #[test]
    fn blank_url_is_rejected() {
        let config = AppenderConfig {
            url: Some("   ".into()),
            ..AppenderConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn crash_upload_falls_back_to_default_url() {
        let config = AppenderConfig {
            destination: crash(),
            ..AppenderConfig::default()
        };
        assert_eq!(config.request_url().expect("url"), DEFAULT_CRASH_UPLOAD_URL);
    }

    #[test]
    fn inverted_status_range_is_rejected() {
        let config = AppenderConfig {
            url: Some("http://localhost/hook".into()),
            success_status: StatusRange { min: 300, max: 200 },
            ..AppenderConfig::default()
        };
        let err = config.validate().expect_err("inverted range");
        assert!(err.to_string().contains("success_status"));
    }

    #[rstest]
    #[case::rendezvous(0, true)]
    #[case::at_limit(MAX_QUEUE_CAPACITY, true)]
    #[case::over_limit(MAX_QUEUE_CAPACITY + 1, false)]
    #[case::huge(usize::MAX, false)]
    fn queue_capacity_is_bounded(#[case] capacity: usize, #[case] valid: bool) {
        let config = AppenderConfig {
            url: Some("http://localhost/hook".into()),
            queue_capacity: capacity,
            ..AppenderConfig::default()
        };
        match config.validate() {
            Ok(()) => assert!(valid),
            Err(err) => {
                assert!(!valid);
                assert!(err.to_string().contains("queue_capacity"));
            }
        }
    }

    #[test]
    fn zero_crash_budget_is_rejected() {
        let config = AppenderConfig {
            destination: Destination::CrashUpload(CrashUploadConfig {
                max_crash_log_bytes: 0,
                ..CrashUploadConfig::default()
            }),
            ..AppenderConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
