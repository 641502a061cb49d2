//! Request construction strategies.
//!
//! A [`RequestBuilder`] turns a [`LogRecord`] into a [`RequestDescription`]
//! (or declines with `Ok(None)`). The variant is chosen once, at start, from
//! the configured [`Destination`]:
//!
//! - [`GetRequestBuilder`]: bodiless GET, useful as a heartbeat.
//! - [`JsonPostBuilder`]: POST of a JSON object built from static fields and
//!   optionally the record message.
//! - [`CrashUploadBuilder`]: multipart crash upload with generated files.

use std::collections::HashMap;
use std::io;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use thiserror::Error;

use crate::{
    config::{AppenderConfig, AuthConfig, ConfigError, Destination},
    diagnostics::Diagnostics,
    log_record::LogRecord,
};

mod crash;
mod get;
mod json;
mod multipart;

pub use crash::{CrashLog, CrashUploadBuilder, DeviceInfo, ParseCrashLogError};
pub use get::GetRequestBuilder;
pub use json::JsonPostBuilder;
pub use multipart::{Attachment, MultipartForm, Part, PartContent};

/// Per-record failure to build a request. The record is dropped.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Writing a generated attachment failed.
    #[error("failed to write attachment: {0}")]
    Attachment(#[from] io::Error),
    /// Serializing the JSON body failed.
    #[error("failed to serialize request body: {0}")]
    Json(#[from] serde_json::Error),
}

/// HTTP methods used by the builders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Request payload.
#[derive(Debug)]
pub enum RequestBody {
    Empty,
    /// A single entity with its content type.
    Text { content_type: String, data: String },
    Multipart(MultipartForm),
}

/// Everything the delivery client needs to issue one request.
#[derive(Debug)]
pub struct RequestDescription {
    pub method: Method,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: RequestBody,
}

impl RequestDescription {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// Set a header, replacing any value stored under the same name in any
    /// case.
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(header_key(key), value.into());
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Header lookup, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(&header_key(key)).map(String::as_str)
    }

    /// Multipart form, if the body is one.
    pub fn form(&self) -> Option<&MultipartForm> {
        match &self.body {
            RequestBody::Multipart(form) => Some(form),
            _ => None,
        }
    }

    /// Remove any generated files attached to the request.
    pub fn release(self, diagnostics: &Diagnostics) {
        if let RequestBody::Multipart(form) = self.body {
            form.release(diagnostics);
        }
    }
}

/// Header names are stored lower-cased so each name maps to one value.
fn header_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// URL plus the static headers shared by every request to it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    /// Add the `Authorization` header implied by `auth`, if any.
    pub fn with_auth(mut self, auth: &AuthConfig) -> Self {
        match auth {
            AuthConfig::None => {}
            AuthConfig::Basic { username, password } => {
                let encoded = base64_encode(format!("{username}:{password}").as_bytes());
                self = self.with_header("Authorization", format!("Basic {encoded}"));
            }
            AuthConfig::Bearer { token } => {
                self = self.with_header("Authorization", format!("Bearer {token}"));
            }
        }
        self
    }

    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(header_key(key), value.into());
        self
    }

    pub fn with_headers(mut self, headers: &HashMap<String, String>) -> Self {
        self.headers
            .extend(headers.iter().map(|(k, v)| (header_key(k), v.clone())));
        self
    }

    /// Header lookup, ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(&header_key(key)).map(String::as_str)
    }

    /// Start a request to this endpoint carrying the static headers.
    pub fn request(&self, method: Method) -> RequestDescription {
        RequestDescription {
            method,
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: RequestBody::Empty,
        }
    }
}

/// Base64-encode a byte slice for Basic auth.
fn base64_encode(input: &[u8]) -> String {
    BASE64_STANDARD.encode(input)
}

/// The closed set of request strategies.
#[derive(Debug)]
pub enum RequestBuilder {
    Get(GetRequestBuilder),
    JsonPost(JsonPostBuilder),
    CrashUpload(CrashUploadBuilder),
}

impl RequestBuilder {
    /// Resolve the configured destination into a ready builder.
    ///
    /// Runs once, at start: URL placeholders are substituted here and
    /// destination-specific required fields are checked.
    pub fn from_config(
        config: &AppenderConfig,
        diagnostics: Diagnostics,
    ) -> Result<Self, ConfigError> {
        let url = config.request_url()?;
        let builder = match &config.destination {
            Destination::Get => {
                let endpoint = Endpoint::new(url)
                    .with_headers(&config.headers)
                    .with_auth(&config.auth);
                Self::Get(GetRequestBuilder::new(endpoint))
            }
            Destination::JsonPost(json) => {
                let endpoint = Endpoint::new(url)
                    .with_headers(&config.headers)
                    .with_auth(&config.auth);
                Self::JsonPost(JsonPostBuilder::new(endpoint, json.clone()))
            }
            Destination::CrashUpload(crash) => Self::CrashUpload(CrashUploadBuilder::new(
                url,
                &config.headers,
                crash,
                diagnostics,
            )?),
        };
        Ok(builder)
    }

    /// Build the request for `record`; `Ok(None)` means skip it.
    pub fn build(&self, record: &LogRecord) -> Result<Option<RequestDescription>, BuildError> {
        match self {
            Self::Get(b) => Ok(Some(b.build(record))),
            Self::JsonPost(b) => b.build(record).map(Some),
            Self::CrashUpload(b) => b.build(record),
        }
    }

    /// Resolved target URL.
    pub fn url(&self) -> &str {
        match self {
            Self::Get(b) => &b.endpoint().url,
            Self::JsonPost(b) => &b.endpoint().url,
            Self::CrashUpload(b) => &b.endpoint().url,
        }
    }
}
