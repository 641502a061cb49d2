//! Asynchronous forwarding of log records to HTTP endpoints.
//!
//! An [`HttpAppender`] admits records by level, queues them without
//! blocking the caller, and lets a single background worker turn each one
//! into a request (plain GET, JSON POST or multipart crash upload) and send
//! it. Delivery is best effort: overflow, build failures and failed
//! deliveries are logged under the [`diagnostics::TARGET`] target and the
//! record is dropped.

pub mod appender;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod filters;
pub mod level;
pub mod log_record;
pub mod queue;
pub mod rate_limited_warner;
pub mod request;
pub mod worker;

pub use appender::{HttpAppender, StartError, WorkerState};
pub use client::{ClientTimeouts, DeliveryClient, DeliveryError, StatusRange};
pub use config::{
    AppenderConfig, AppenderConfigBuilder, AuthConfig, ConfigError, CrashUploadConfig,
    Destination, JsonPostConfig,
};
pub use diagnostics::Diagnostics;
pub use filters::{LevelFilter, RecordFilter};
pub use level::{Level, ParseLevelError};
pub use log_record::{ExceptionInfo, LogRecord};
pub use queue::{CancelToken, Dequeued, EventDrain, EventQueue, event_queue};
pub use rate_limited_warner::RateLimitedWarner;
pub use request::{
    Attachment, BuildError, CrashLog, CrashUploadBuilder, DeviceInfo, GetRequestBuilder,
    JsonPostBuilder, Method, MultipartForm, Part, PartContent, RequestBody, RequestBuilder,
    RequestDescription,
};
pub use worker::{DeliveryWorker, WorkerExit};
