//! Diagnostics handle passed to each pipeline component.
//!
//! Components never reach for a module-level logger; the appender builds one
//! [`Diagnostics`] value and hands clones to the worker, the request builder
//! and the delivery client. Messages go through the `log` facade under the
//! [`TARGET`] target, prefixed with the appender name.

use std::fmt;
use std::sync::Arc;

use log::Level;

/// `log` target used for every message emitted by this crate.
pub const TARGET: &str = "relaylog";

#[derive(Clone, Debug)]
pub struct Diagnostics {
    name: Arc<str>,
}

impl Diagnostics {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
        }
    }

    /// Appender name used as the message prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Error, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Warn, args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Debug, args);
    }

    fn emit(&self, level: Level, args: fmt::Arguments<'_>) {
        if log::log_enabled!(target: TARGET, level) {
            log::log!(target: TARGET, level, "{}: {}", self.name, args);
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new("HttpAppender")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serial_test::serial;

    #[test]
    #[serial]
    fn prefixes_messages_with_name() {
        let mut logger = crate::test_logging::start();
        let diagnostics = Diagnostics::new("crash-reporter");
        diagnostics.warn(format_args!("request failed: {}", 503));
        let record = std::iter::from_fn(|| logger.pop())
            .find(|r| r.args().starts_with("crash-reporter:"))
            .expect("warning emitted");
        assert_eq!(record.level(), Level::Warn);
        assert_eq!(record.target(), TARGET);
        assert_eq!(record.args(), "crash-reporter: request failed: 503");
    }
}
