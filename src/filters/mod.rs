//! Filtering components for log records.
//!
//! Provides the [`RecordFilter`] trait and the per-severity [`LevelFilter`]
//! that decides whether a record is queued for delivery at all.

use crate::log_record::LogRecord;

pub mod level_filter;

pub use level_filter::LevelFilter;

/// Trait implemented by all record filters.
///
/// Filters are `Send + Sync` so the producer path and the delivery worker can
/// consult the same policy.
pub trait RecordFilter: Send + Sync {
    /// Return `true` if `record` should be delivered.
    fn should_deliver(&self, record: &LogRecord) -> bool;
}
