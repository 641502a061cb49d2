//! Per-severity enable set.

use crate::{config::ConfigError, filters::RecordFilter, level::Level, log_record::LogRecord};

/// Independent enable flag per [`Level`], all disabled by default.
///
/// Unlike a threshold filter, enabling `ERROR` says nothing about `WARN`:
/// delivery is opted into one severity at a time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LevelFilter {
    enabled: [bool; 5],
}

impl LevelFilter {
    /// Create a filter that admits nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` iff `level` has been enabled.
    pub fn admit(&self, level: Level) -> bool {
        self.enabled[level.index()]
    }

    /// Enable `level`.
    pub fn enable_level(&mut self, level: Level) {
        self.enabled[level.index()] = true;
    }

    /// Enable a level by name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLevel`] listing the valid names when
    /// `name` is outside the closed level set.
    pub fn enable(&mut self, name: &str) -> Result<(), ConfigError> {
        let level = name.parse::<Level>()?;
        self.enable_level(level);
        Ok(())
    }

    /// Enable every level in a comma separated list such as `"error, warn"`.
    ///
    /// Nothing is enabled if any entry is invalid.
    pub fn enable_all(&mut self, names: &str) -> Result<(), ConfigError> {
        let mut next = *self;
        for name in names.split(',').filter(|n| !n.trim().is_empty()) {
            next.enable(name)?;
        }
        *self = next;
        Ok(())
    }

    /// Builder-style variant of [`enable_level`](Self::enable_level).
    pub fn with_level(mut self, level: Level) -> Self {
        self.enable_level(level);
        self
    }

    /// Enabled levels, most urgent first.
    pub fn enabled_levels(&self) -> Vec<Level> {
        Level::ALL.into_iter().filter(|l| self.admit(*l)).collect()
    }

    /// `true` when no level is enabled.
    pub fn is_empty(&self) -> bool {
        !self.enabled.iter().any(|e| *e)
    }
}

impl RecordFilter for LevelFilter {
    fn should_deliver(&self, record: &LogRecord) -> bool {
        self.admit(record.level)
    }
}
