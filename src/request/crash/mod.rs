//! Multipart crash upload strategy.
//!
//! Each record becomes a POST carrying:
//!
//! - `log`: a generated `exception*.exc.log` file holding the [`CrashLog`],
//!   capped at the configured byte budget;
//! - `description`: a generated `description*.log` file with the message and
//!   date, unless disabled;
//! - `userID` / `contact`: text parts, when configured and short enough.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::{
    config::{APP_ID_PLACEHOLDER, ConfigError, CrashUploadConfig, MAX_OPTIONAL_FIELD_CHARS},
    diagnostics::Diagnostics,
    log_record::LogRecord,
};

use super::{Attachment, BuildError, Endpoint, Method, MultipartForm, RequestBody, RequestDescription};

mod report;

pub use report::{CrashLog, DeviceInfo, ParseCrashLogError};
use report::format_timestamp;

/// Header carrying the API token.
pub const TOKEN_HEADER: &str = "X-HockeyAppToken";

/// Characters escaped when the app id is placed in a URL path segment.
const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug)]
pub struct CrashUploadBuilder {
    endpoint: Endpoint,
    device: DeviceInfo,
    user_id: Option<String>,
    contact: Option<String>,
    include_description: bool,
    max_crash_log_bytes: usize,
    attachment_dir: Option<PathBuf>,
    diagnostics: Diagnostics,
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingField(field))
}

/// Keep an optional text field only if it is within the length limit.
fn bounded_field(
    name: &str,
    value: Option<&String>,
    diagnostics: &Diagnostics,
) -> Option<String> {
    let value = value?;
    let chars = value.chars().count();
    if chars > MAX_OPTIONAL_FIELD_CHARS {
        diagnostics.debug(format_args!(
            "ignoring {name}: {chars} characters exceeds {MAX_OPTIONAL_FIELD_CHARS}"
        ));
        return None;
    }
    Some(value.clone())
}

impl CrashUploadBuilder {
    /// Resolve the upload URL and check required fields.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingField`] naming the first of `api_token`,
    /// `app_id` or `package_name` that is absent or blank.
    pub fn new(
        url_template: &str,
        headers: &HashMap<String, String>,
        config: &CrashUploadConfig,
        diagnostics: Diagnostics,
    ) -> Result<Self, ConfigError> {
        let token = required(config.api_token.as_deref(), "api_token")?;
        let app_id = required(config.app_id.as_deref(), "app_id")?;
        let package = required(config.package_name.as_deref(), "package_name")?;

        let encoded_id = utf8_percent_encode(app_id, PATH_SEGMENT_ENCODE_SET).to_string();
        let url = url_template.replace(APP_ID_PLACEHOLDER, &encoded_id);
        let endpoint = Endpoint::new(url)
            .with_headers(headers)
            .with_header(TOKEN_HEADER, token);

        let optional = |v: &Option<String>| v.clone().unwrap_or_default();
        let device = DeviceInfo {
            package: package.to_owned(),
            version: optional(&config.version),
            os: optional(&config.os),
            manufacturer: optional(&config.manufacturer),
            model: optional(&config.model),
        };

        Ok(Self {
            endpoint,
            device,
            user_id: bounded_field("user_id", config.user_id.as_ref(), &diagnostics),
            contact: bounded_field("contact", config.contact.as_ref(), &diagnostics),
            include_description: config.include_description,
            max_crash_log_bytes: config.max_crash_log_bytes,
            attachment_dir: config.attachment_dir.clone(),
            diagnostics,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn attach(&self, prefix: &str, suffix: &str, content: &str) -> io::Result<Attachment> {
        match &self.attachment_dir {
            Some(dir) => Attachment::write_in(dir, prefix, suffix, content),
            None => Attachment::write(prefix, suffix, content),
        }
    }

    /// Build the upload for `record`. Every record is uploaded; one with no
    /// exception and an empty message gets a header-only crash log.
    ///
    /// Attachments already written are removed if a later one fails.
    pub fn build(&self, record: &LogRecord) -> Result<Option<RequestDescription>, BuildError> {
        let mut crash_log = CrashLog::from_record(&self.device, record);
        let dropped = crash_log.shrink_to_fit(self.max_crash_log_bytes);
        if dropped > 0 {
            self.diagnostics.debug(format_args!(
                "crash log trimmed by {dropped} lines to fit {} bytes",
                self.max_crash_log_bytes
            ));
        }
        let content = crash_log.render_within(self.max_crash_log_bytes);
        let log_file = self.attach("exception", ".exc.log", &content)?;
        self.diagnostics.debug(format_args!(
            "wrote crash log {} ({} bytes)",
            log_file.path().display(),
            log_file.len()
        ));

        let mut form = MultipartForm::new().file("log", log_file);
        if self.include_description {
            let description = format!(
                "Description: {}\nDate: {}\n\n",
                record.message,
                format_timestamp(record.timestamp_ms)
            );
            match self.attach("description", ".log", &description) {
                Ok(file) => form = form.file("description", file),
                Err(err) => {
                    form.release(&self.diagnostics);
                    return Err(err.into());
                }
            }
        }
        if let Some(user_id) = &self.user_id {
            form = form.text("userID", user_id.clone());
        }
        if let Some(contact) = &self.contact {
            form = form.text("contact", contact.clone());
        }

        Ok(Some(
            self.endpoint
                .request(Method::Post)
                .with_body(RequestBody::Multipart(form)),
        ))
    }
}
