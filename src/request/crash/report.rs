//! Crash log layout, size capping and parse-back.
//!
//! A rendered crash log is a `Key: value` header block, a blank line, then
//! one body line per `\n`:
//!
//! ```text
//! Package: com.example.app
//! Version: 1.2.0
//! OS: Linux
//! Manufacturer: Example
//! Model: x86_64
//! Date: 2024-05-01 12:00:00
//!
//! java.lang.IllegalStateException boom
//! 	at com.example.Main.run(Main.java:42)
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::log_record::LogRecord;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const HEADER_KEYS: [&str; 6] = ["Package", "Version", "OS", "Manufacturer", "Model", "Date"];

/// Device metadata written into every crash log header.
///
/// Absent optional values are stored as empty strings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub package: String,
    pub version: String,
    pub os: String,
    pub manufacturer: String,
    pub model: String,
}

/// Failure to read a rendered crash log back.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseCrashLogError {
    #[error("crash log has no blank line after the header block")]
    MissingSeparator,
    #[error("crash log header {0} missing or out of order")]
    MissingHeader(&'static str),
    #[error("malformed crash log header line: {0:?}")]
    MalformedHeader(String),
}

/// In-memory crash log for one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrashLog {
    pub device: DeviceInfo,
    pub date: String,
    /// Body lines, without terminators.
    pub lines: Vec<String>,
}

/// Format epoch milliseconds as `yyyy-MM-dd HH:mm:ss` in UTC.
pub(crate) fn format_timestamp(timestamp_ms: u64) -> String {
    let millis = i64::try_from(timestamp_ms).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .format(DATE_FORMAT)
        .to_string()
}

fn header_value(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Split on `\n` only, so `\r` and empty trailing lines are kept.
fn text_lines(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split('\n').map(str::to_owned)
}

/// Body lines for `record`: its exception chain when present, otherwise its
/// message. An empty message gives a header-only log.
fn body_lines(record: &LogRecord) -> Vec<String> {
    let Some(exception) = &record.exception else {
        if record.message.is_empty() {
            return Vec::new();
        }
        return text_lines(&record.message).collect();
    };
    let mut lines = Vec::new();
    for (depth, exc) in exception.chain().enumerate() {
        let headline = exc.headline();
        if depth == 0 {
            lines.extend(text_lines(&headline));
        } else {
            lines.extend(text_lines(&format!("Caused by: {}", headline.trim_start())));
        }
        lines.extend(exc.frames.iter().map(|frame| format!("\t{frame}")));
    }
    lines
}

impl CrashLog {
    pub fn from_record(device: &DeviceInfo, record: &LogRecord) -> Self {
        Self {
            device: device.clone(),
            date: format_timestamp(record.timestamp_ms),
            lines: body_lines(record),
        }
    }

    fn header(&self) -> String {
        let d = &self.device;
        let values = [
            &d.package,
            &d.version,
            &d.os,
            &d.manufacturer,
            &d.model,
            &self.date,
        ];
        let mut out = String::new();
        for (key, value) in HEADER_KEYS.iter().zip(values) {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(&header_value(value));
            out.push('\n');
        }
        out.push('\n');
        out
    }

    pub fn render(&self) -> String {
        let mut out = self.header();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Byte length of [`render`](Self::render) without allocating the body.
    pub fn rendered_len(&self) -> usize {
        self.header().len() + self.lines.iter().map(|l| l.len() + 1).sum::<usize>()
    }

    /// Drop trailing body lines until the rendered log fits in `max_bytes`.
    ///
    /// Returns the number of lines dropped. The log may still exceed the
    /// budget if the header alone is larger.
    pub fn shrink_to_fit(&mut self, max_bytes: usize) -> usize {
        let mut len = self.rendered_len();
        let mut dropped = 0;
        while len > max_bytes {
            let Some(line) = self.lines.pop() else { break };
            len -= line.len() + 1;
            dropped += 1;
        }
        dropped
    }

    /// Render after shrinking, cutting at a character boundary as a last
    /// resort. The result never exceeds `max_bytes`.
    pub fn render_within(&mut self, max_bytes: usize) -> String {
        self.shrink_to_fit(max_bytes);
        let mut out = self.render();
        if out.len() > max_bytes {
            let cut = (0..=max_bytes)
                .rev()
                .find(|&i| out.is_char_boundary(i))
                .unwrap_or(0);
            out.truncate(cut);
        }
        out
    }

    /// Read a rendered crash log back.
    pub fn parse(text: &str) -> Result<Self, ParseCrashLogError> {
        let (header, body) = text
            .split_once("\n\n")
            .ok_or(ParseCrashLogError::MissingSeparator)?;
        let mut fields = header.lines();
        let mut values = Vec::with_capacity(HEADER_KEYS.len());
        for key in HEADER_KEYS {
            let line = fields.next().ok_or(ParseCrashLogError::MissingHeader(key))?;
            let (name, value) = line
                .split_once(": ")
                .ok_or_else(|| ParseCrashLogError::MalformedHeader(line.to_owned()))?;
            if name != key {
                return Err(ParseCrashLogError::MissingHeader(key));
            }
            values.push(value.to_owned());
        }
        if let Some(extra) = fields.next() {
            return Err(ParseCrashLogError::MalformedHeader(extra.to_owned()));
        }
        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_default();
        let device = DeviceInfo {
            package: next(),
            version: next(),
            os: next(),
            manufacturer: next(),
            model: next(),
        };
        let mut lines: Vec<String> = text_lines(body).collect();
        // Terminator of the last line.
        if lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }
        Ok(Self {
            device,
            date: next(),
            lines,
        })
    }
}
