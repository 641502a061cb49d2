//! INI loading for [`AppenderConfig`].
//!
//! One section describes one appender:
//!
//! ```ini
//! [crash]
//! destination = crash
//! levels = error, warn
//! queue_capacity = 0
//! api_token = 0123abcd
//! app_id = 42
//! package_name = com.example.app
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use serde_json::Value;

use super::types::{
    AppenderConfig, AuthConfig, ConfigError, CrashUploadConfig, Destination, JsonPostConfig,
};

const HEADER_PREFIX: &str = "header.";
const JSON_FIELD_PREFIX: &str = "json.";

impl AppenderConfig {
    /// Load the appender described by `section` from an INI file.
    pub fn from_ini_file(path: impl AsRef<Path>, section: &str) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ini = Ini::load_from_file(path)
            .map_err(|e| ConfigError::Ini(format!("{}: {e}", path.display())))?;
        from_ini(&ini, section)
    }

    /// Load the appender described by `section` from INI text.
    pub fn from_ini_str(text: &str, section: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Ini(e.to_string()))?;
        from_ini(&ini, section)
    }
}

fn from_ini(ini: &Ini, section: &str) -> Result<AppenderConfig, ConfigError> {
    let props = ini
        .section(Some(section))
        .ok_or_else(|| ConfigError::MissingSection(section.to_owned()))?;
    SectionReader::new(section, props)?.read(props)
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, e.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(ConfigError::invalid(key, format!("expected a boolean, got '{other}'"))),
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let ms: u64 = parse_value(key, value)?;
    if ms == 0 {
        return Err(ConfigError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_millis(ms))
}

enum Kind {
    Get,
    Json(JsonPostConfig),
    Crash(CrashUploadConfig),
}

struct SectionReader {
    config: AppenderConfig,
    kind: Kind,
    basic_username: Option<String>,
    basic_password: Option<String>,
}

impl SectionReader {
    fn new(section: &str, props: &Properties) -> Result<Self, ConfigError> {
        let kind = match props.get("destination").map(|d| d.trim().to_ascii_lowercase()) {
            None => Kind::Get,
            Some(d) if d == "get" => Kind::Get,
            Some(d) if d == "json" => Kind::Json(JsonPostConfig::default()),
            Some(d) if d == "crash" => Kind::Crash(CrashUploadConfig::default()),
            Some(other) => {
                return Err(ConfigError::invalid(
                    "destination",
                    format!("expected one of get, json, crash; got '{other}'"),
                ));
            }
        };
        Ok(Self {
            config: AppenderConfig {
                name: section.to_owned(),
                ..AppenderConfig::default()
            },
            kind,
            basic_username: None,
            basic_password: None,
        })
    }

    fn read(mut self, props: &Properties) -> Result<AppenderConfig, ConfigError> {
        for (key, value) in props.iter() {
            if !self.read_common(key, value)? && !self.read_destination(key, value)? {
                return Err(ConfigError::invalid(key, "unknown key"));
            }
        }
        self.finish()
    }

    fn read_common(&mut self, key: &str, value: &str) -> Result<bool, ConfigError> {
        let config = &mut self.config;
        match key {
            "destination" => {}
            "name" => config.name = value.trim().to_owned(),
            "url" => config.url = Some(value.trim().to_owned()),
            "queue_capacity" => config.queue_capacity = parse_value(key, value)?,
            "success_status_min" => config.success_status.min = parse_value(key, value)?,
            "success_status_max" => config.success_status.max = parse_value(key, value)?,
            "levels" => config.levels.enable_all(value)?,
            "connect_timeout_ms" => config.timeouts.connect = parse_millis(key, value)?,
            "read_timeout_ms" => config.timeouts.read = parse_millis(key, value)?,
            "write_timeout_ms" => config.timeouts.write = parse_millis(key, value)?,
            "warn_interval_ms" => {
                config.warn_interval = Duration::from_millis(parse_value(key, value)?);
            }
            "auth_bearer_token" => {
                config.auth = AuthConfig::Bearer {
                    token: value.trim().to_owned(),
                };
            }
            "auth_basic_username" => self.basic_username = Some(value.trim().to_owned()),
            "auth_basic_password" => self.basic_password = Some(value.to_owned()),
            _ => match key.strip_prefix(HEADER_PREFIX) {
                Some(name) if !name.is_empty() => {
                    config.headers.insert(name.to_owned(), value.trim().to_owned());
                }
                _ => return Ok(false),
            },
        }
        Ok(true)
    }

    fn read_destination(&mut self, key: &str, value: &str) -> Result<bool, ConfigError> {
        match &mut self.kind {
            Kind::Get => Ok(false),
            Kind::Json(json) => read_json_key(json, key, value),
            Kind::Crash(crash) => read_crash_key(crash, key, value),
        }
    }

    fn finish(mut self) -> Result<AppenderConfig, ConfigError> {
        match (self.basic_username.take(), self.basic_password.take()) {
            (Some(username), Some(password)) => {
                self.config.auth = AuthConfig::Basic { username, password };
            }
            (None, None) => {}
            (Some(_), None) => return Err(ConfigError::MissingField("auth_basic_password")),
            (None, Some(_)) => return Err(ConfigError::MissingField("auth_basic_username")),
        }
        self.config.destination = match self.kind {
            Kind::Get => Destination::Get,
            Kind::Json(json) => Destination::JsonPost(json),
            Kind::Crash(crash) => Destination::CrashUpload(crash),
        };
        Ok(self.config)
    }
}

fn read_json_key(json: &mut JsonPostConfig, key: &str, value: &str) -> Result<bool, ConfigError> {
    match key {
        "json_message_field" => json.message_field = Some(value.trim().to_owned()),
        "json_content_type" => json.content_type = value.trim().to_owned(),
        _ => match key.strip_prefix(JSON_FIELD_PREFIX) {
            Some(field) if !field.is_empty() => {
                json.fields
                    .insert(field.to_owned(), Value::String(value.to_owned()));
            }
            _ => return Ok(false),
        },
    }
    Ok(true)
}

fn read_crash_key(
    crash: &mut CrashUploadConfig,
    key: &str,
    value: &str,
) -> Result<bool, ConfigError> {
    let text = || Some(value.trim().to_owned());
    match key {
        "api_token" => crash.api_token = text(),
        "app_id" => crash.app_id = text(),
        "package_name" => crash.package_name = text(),
        "version" => crash.version = text(),
        "os" => crash.os = text(),
        "manufacturer" => crash.manufacturer = text(),
        "model" => crash.model = text(),
        "user_id" => crash.user_id = text(),
        "contact" => crash.contact = text(),
        "include_description" => crash.include_description = parse_bool(key, value)?,
        "max_crash_log_bytes" => crash.max_crash_log_bytes = parse_value(key, value)?,
        "attachment_dir" => crash.attachment_dir = Some(PathBuf::from(value.trim())),
        _ => return Ok(false),
    }
    Ok(true)
}
