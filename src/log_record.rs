//! Log record representation consumed by the appender.
//!
//! Records are produced by the surrounding logging framework and handed to
//! [`HttpAppender::on_record`](crate::HttpAppender::on_record). The pipeline
//! only ever reads them.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::level::Level;

/// One exception in an error chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExceptionInfo {
    /// Fully qualified type name of the exception, if known.
    pub class_name: Option<String>,
    /// Exception message, if any.
    pub message: Option<String>,
    /// Stack frames, innermost first, each a source-location string.
    pub frames: Vec<String>,
    /// The exception that caused this one.
    pub cause: Option<Box<ExceptionInfo>>,
}

impl ExceptionInfo {
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_frames<I, S>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.frames = frames.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cause(mut self, cause: ExceptionInfo) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Iterate over this exception and its causes, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &ExceptionInfo> {
        std::iter::successors(Some(self), |exc| exc.cause.as_deref())
    }

    /// `<class> <message>` headline, empty when both parts are absent.
    pub fn headline(&self) -> String {
        match (self.class_name.as_deref(), self.message.as_deref()) {
            (Some(class), Some(msg)) => format!("{class} {msg}"),
            (Some(class), None) => class.to_owned(),
            (None, Some(msg)) => format!(" {msg}"),
            (None, None) => String::new(),
        }
    }
}

/// A single emitted log event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    /// Name of the logger that produced the record.
    pub logger: String,
    /// Record severity.
    pub level: Level,
    /// Fully formatted message text.
    pub message: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Attached error chain, if the record carries one.
    pub exception: Option<ExceptionInfo>,
    /// Free-form structured attributes.
    pub attributes: BTreeMap<String, String>,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

impl LogRecord {
    /// Construct a record stamped with the current time.
    pub fn new(logger: &str, level: Level, message: &str) -> Self {
        Self {
            logger: logger.to_owned(),
            level,
            message: message.to_owned(),
            timestamp_ms: now_millis(),
            exception: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_timestamp_ms(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.level, self.message)
    }
}
