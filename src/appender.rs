//! Lifecycle shell around the delivery pipeline.
//!
//! [`HttpAppender`] validates its configuration on [`start`](HttpAppender::start),
//! builds a fresh queue, request builder, client and worker thread, and tears
//! them down again on [`stop`](HttpAppender::stop). Producers call
//! [`on_record`](HttpAppender::on_record), which filters by level and offers
//! the record to the queue without blocking.

use std::{
    io,
    panic::{AssertUnwindSafe, catch_unwind, resume_unwind},
    sync::Arc,
    thread::JoinHandle,
};

use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::{
    client::DeliveryClient,
    config::{AppenderConfig, ConfigError},
    diagnostics::Diagnostics,
    filters::LevelFilter,
    log_record::LogRecord,
    queue::{CancelToken, EventQueue, event_queue_with_warner},
    rate_limited_warner::RateLimitedWarner,
    request::RequestBuilder,
    worker::{DeliveryWorker, WorkerExit},
};

/// Appender lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Why [`HttpAppender::start`] failed.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to spawn delivery worker: {0}")]
    Spawn(#[from] io::Error),
}

struct Pipeline {
    queue: EventQueue,
    cancel: CancelToken,
    handle: JoinHandle<WorkerExit>,
}

/// Forwards admitted log records to an HTTP endpoint from a background
/// worker.
///
/// All methods take `&self`, so one instance can be shared between the
/// producer threads and whoever owns its lifecycle.
pub struct HttpAppender {
    config: AppenderConfig,
    filter: LevelFilter,
    diagnostics: Diagnostics,
    lifecycle: Mutex<WorkerState>,
    pipeline: RwLock<Option<Pipeline>>,
}

impl HttpAppender {
    pub fn new(config: AppenderConfig) -> Self {
        let diagnostics = Diagnostics::new(&config.name);
        Self {
            filter: config.levels,
            config,
            diagnostics,
            lifecycle: Mutex::new(WorkerState::Created),
            pipeline: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &AppenderConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        *self.lifecycle.lock()
    }

    /// `true` while the worker thread is running. Turns false if the worker
    /// faults, until the appender is stopped and started again.
    pub fn is_worker_alive(&self) -> bool {
        self.pipeline
            .read()
            .as_ref()
            .is_some_and(|p| !p.handle.is_finished())
    }

    /// Validate the configuration and launch the worker.
    ///
    /// A no-op when already running. May be called again after
    /// [`stop`](Self::stop).
    ///
    /// # Errors
    ///
    /// [`StartError::Config`] for invalid or missing configuration,
    /// [`StartError::Spawn`] if the worker thread cannot be created. The
    /// appender stays in its previous state, also when launching panics.
    pub fn start(&self) -> Result<(), StartError> {
        let mut state = self.lifecycle.lock();
        if matches!(*state, WorkerState::Starting | WorkerState::Running) {
            self.diagnostics.debug(format_args!("already started"));
            return Ok(());
        }
        let previous = std::mem::replace(&mut *state, WorkerState::Starting);
        let launched = match catch_unwind(AssertUnwindSafe(|| self.launch())) {
            Ok(launched) => launched,
            Err(panic) => {
                *state = previous;
                drop(state);
                resume_unwind(panic);
            }
        };
        match launched {
            Ok(pipeline) => {
                *self.pipeline.write() = Some(pipeline);
                *state = WorkerState::Running;
                self.diagnostics.debug(format_args!("started"));
                Ok(())
            }
            Err(err) => {
                *state = previous;
                self.diagnostics.error(format_args!("failed to start: {err}"));
                Err(err)
            }
        }
    }

    fn launch(&self) -> Result<Pipeline, StartError> {
        self.config.validate()?;
        let builder = RequestBuilder::from_config(&self.config, self.diagnostics.clone())?;
        if self.filter.is_empty() {
            self.diagnostics
                .warn(format_args!("no levels enabled; nothing will be delivered"));
        }
        let drops = Arc::new(RateLimitedWarner::new(self.config.warn_interval));
        let (queue, drain, cancel) = event_queue_with_warner(self.config.queue_capacity, drops);
        let client = DeliveryClient::new(
            self.config.timeouts,
            self.config.success_status,
            self.diagnostics.clone(),
        );
        let handle = DeliveryWorker::new(
            drain,
            self.filter,
            builder,
            client,
            self.diagnostics.clone(),
        )
        .spawn()?;
        Ok(Pipeline {
            queue,
            cancel,
            handle,
        })
    }

    /// Cancel the worker and wait for it to finish its current request.
    ///
    /// Records still queued are discarded. A no-op when not running.
    pub fn stop(&self) {
        let mut state = self.lifecycle.lock();
        let Some(mut pipeline) = self.pipeline.write().take() else {
            return;
        };
        *state = WorkerState::Stopping;
        pipeline.cancel.cancel();
        drop(pipeline.queue);
        match pipeline.handle.join() {
            Ok(exit) => self
                .diagnostics
                .debug(format_args!("stopped; worker exit: {exit:?}")),
            Err(_) => self
                .diagnostics
                .error(format_args!("delivery worker thread panicked")),
        }
        *state = WorkerState::Stopped;
    }

    /// Offer `record` for delivery. Never blocks on I/O.
    ///
    /// Returns `true` if the record was queued. Records at disabled levels,
    /// records arriving while the appender is not running, and records that
    /// find the queue full are dropped.
    pub fn on_record(&self, record: LogRecord) -> bool {
        if !self.filter.admit(record.level) {
            return false;
        }
        match self.pipeline.read().as_ref() {
            Some(pipeline) => pipeline.queue.enqueue(record),
            None => false,
        }
    }
}

impl Drop for HttpAppender {
    fn drop(&mut self) {
        self.stop();
    }
}
