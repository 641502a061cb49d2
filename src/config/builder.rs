//! Fluent builder for [`AppenderConfig`].
//!
//! Mirrors the handler builders: setters take `self` by value, level names
//! are checked as they are added, and everything else is checked when the
//! appender starts.

use std::{collections::HashMap, time::Duration};

use crate::client::StatusRange;

use super::types::{
    AppenderConfig, AuthConfig, ConfigError, CrashUploadConfig, Destination, JsonPostConfig,
};

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(ConfigError::invalid($field, "must be greater than zero"))
        } else {
            Ok($value)
        }
    }};
}

/// Builder for constructing [`AppenderConfig`] values.
#[derive(Clone, Debug, Default)]
pub struct AppenderConfigBuilder {
    name: Option<String>,
    url: Option<String>,
    destination: Destination,
    capacity: Option<usize>,
    success_min: Option<u16>,
    success_max: Option<u16>,
    levels: Vec<String>,
    auth: Option<AuthConfig>,
    headers: HashMap<String, String>,
    connect_timeout_ms: Option<u64>,
    read_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    warn_interval_ms: Option<u64>,
}

impl AppenderConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target URL for HTTP requests.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Name used as the diagnostics prefix.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Select the bodiless GET strategy (the default).
    pub fn with_get(mut self) -> Self {
        self.destination = Destination::Get;
        self
    }

    /// Select the JSON-POST strategy.
    pub fn with_json_post(mut self, config: JsonPostConfig) -> Self {
        self.destination = Destination::JsonPost(config);
        self
    }

    /// Select the multipart crash upload strategy.
    pub fn with_crash_upload(mut self, config: CrashUploadConfig) -> Self {
        self.destination = Destination::CrashUpload(config);
        self
    }

    /// Enable delivery for a level, given by name.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.levels.push(level.into());
        self
    }

    /// Configure HTTP Basic authentication.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth = Some(AuthConfig::Basic {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Configure Bearer token authentication.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(AuthConfig::Bearer {
            token: token.into(),
        });
        self
    }

    /// Add a single static HTTP header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Inclusive range of status codes counted as success.
    pub fn with_success_status(mut self, min: u16, max: u16) -> Self {
        self.success_min = Some(min);
        self.success_max = Some(max);
        self
    }

    option_setter!(
        #[doc = "Set the queue capacity; zero selects rendezvous hand-off."]
        with_capacity,
        capacity,
        usize
    );
    option_setter!(
        #[doc = "Set the connect timeout in milliseconds."]
        with_connect_timeout_ms,
        connect_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the read timeout in milliseconds."]
        with_read_timeout_ms,
        read_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the write timeout in milliseconds."]
        with_write_timeout_ms,
        write_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the interval between dropped-record warnings in milliseconds."]
        with_warn_interval_ms,
        warn_interval_ms,
        u64
    );

    fn validate_timeouts(&self) -> Result<(), ConfigError> {
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if let Some(timeout) = self.read_timeout_ms {
            ensure_positive!(timeout, "read_timeout_ms")?;
        }
        if let Some(timeout) = self.write_timeout_ms {
            ensure_positive!(timeout, "write_timeout_ms")?;
        }
        Ok(())
    }

    /// Produce the configuration.
    ///
    /// # Errors
    ///
    /// Fails on an unknown level name or a zero timeout. URL and
    /// destination fields are checked later, by `HttpAppender::start`.
    pub fn build(&self) -> Result<AppenderConfig, ConfigError> {
        self.validate_timeouts()?;

        let defaults = AppenderConfig::default();
        let mut levels = defaults.levels;
        for name in &self.levels {
            levels.enable(name)?;
        }
        let mut timeouts = defaults.timeouts;
        if let Some(ms) = self.connect_timeout_ms {
            timeouts.connect = Duration::from_millis(ms);
        }
        if let Some(ms) = self.read_timeout_ms {
            timeouts.read = Duration::from_millis(ms);
        }
        if let Some(ms) = self.write_timeout_ms {
            timeouts.write = Duration::from_millis(ms);
        }

        Ok(AppenderConfig {
            name: self.name.clone().unwrap_or(defaults.name),
            url: self.url.clone(),
            destination: self.destination.clone(),
            queue_capacity: self.capacity.unwrap_or(defaults.queue_capacity),
            success_status: StatusRange {
                min: self.success_min.unwrap_or(defaults.success_status.min),
                max: self.success_max.unwrap_or(defaults.success_status.max),
            },
            levels,
            auth: self.auth.clone().unwrap_or(defaults.auth),
            headers: self.headers.clone(),
            timeouts,
            warn_interval: self
                .warn_interval_ms
                .map_or(defaults.warn_interval, Duration::from_millis),
        })
    }
}
