//! Background delivery worker.
//!
//! One worker thread per appender drains the [`EventDrain`], re-checks the
//! level filter, builds a request and sends it, strictly one record at a
//! time. Build and delivery failures are logged and the loop moves on; a
//! panic while handling a record ends the worker.

use std::{
    io,
    panic::{AssertUnwindSafe, catch_unwind},
    thread::{self, JoinHandle},
};

use crate::{
    client::DeliveryClient,
    diagnostics::Diagnostics,
    filters::{LevelFilter, RecordFilter},
    log_record::LogRecord,
    queue::{Dequeued, EventDrain},
    request::RequestBuilder,
};

/// Message that makes [`DeliveryWorker::process`] panic in unit tests.
#[cfg(test)]
pub(crate) const FAULT_MESSAGE: &str = "relaylog: injected worker fault";

/// Why a worker loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// The cancel token fired.
    Cancelled,
    /// All producer handles were dropped.
    Closed,
    /// Handling a record panicked.
    Faulted,
}

/// Owns the request builder and delivery client for its running lifetime.
pub struct DeliveryWorker {
    drain: EventDrain,
    filter: LevelFilter,
    builder: RequestBuilder,
    client: DeliveryClient,
    diagnostics: Diagnostics,
}

impl DeliveryWorker {
    pub fn new(
        drain: EventDrain,
        filter: LevelFilter,
        builder: RequestBuilder,
        client: DeliveryClient,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            drain,
            filter,
            builder,
            client,
            diagnostics,
        }
    }

    /// Run the loop on a named thread.
    pub fn spawn(self) -> io::Result<JoinHandle<WorkerExit>> {
        thread::Builder::new()
            .name(format!("relaylog-{}", self.diagnostics.name()))
            .spawn(move || self.run())
    }

    /// Run the loop on the current thread until cancelled, closed or
    /// faulted. The client is dropped on return.
    pub fn run(self) -> WorkerExit {
        self.diagnostics
            .debug(format_args!("delivery worker started for {}", self.builder.url()));
        let exit = loop {
            let record = match self.drain.dequeue() {
                Dequeued::Record(record) => record,
                Dequeued::Cancelled => break WorkerExit::Cancelled,
                Dequeued::Closed => break WorkerExit::Closed,
            };
            self.report_drops();
            if catch_unwind(AssertUnwindSafe(|| self.process(record))).is_err() {
                self.diagnostics.error(format_args!(
                    "delivery worker panicked while handling a record; stopping"
                ));
                break WorkerExit::Faulted;
            }
        };
        self.drain.drops().flush(|count| {
            self.diagnostics
                .warn(format_args!("dropped {count} records: queue full"));
        });
        self.diagnostics
            .debug(format_args!("delivery worker exiting: {exit:?}"));
        exit
    }

    fn report_drops(&self) {
        self.drain.drops().warn_if_due(|count| {
            self.diagnostics
                .warn(format_args!("dropped {count} records: queue full"));
        });
    }

    fn process(&self, record: LogRecord) {
        #[cfg(test)]
        if record.message == FAULT_MESSAGE {
            panic!("{FAULT_MESSAGE}");
        }
        if !self.filter.should_deliver(&record) {
            self.diagnostics.debug(format_args!(
                "discarding {} record not enabled for delivery",
                record.level
            ));
            return;
        }
        let request = match self.builder.build(&record) {
            Ok(Some(request)) => request,
            Ok(None) => return,
            Err(err) => {
                self.diagnostics
                    .warn(format_args!("failed to build request: {err}"));
                return;
            }
        };
        match self.client.send(request) {
            Ok(status) => self
                .diagnostics
                .debug(format_args!("delivered {} record ({status})", record.level)),
            Err(err) => self
                .diagnostics
                .warn(format_args!("delivery of {} record failed: {err}", record.level)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;


    use serial_test::serial;

    use super::*;
    use crate::{
        client::{ClientTimeouts, StatusRange},
        config::{AppenderConfig, CrashUploadConfig, Destination},
        level::Level,
        queue::event_queue,
    };

    /// Nothing listens on a released ephemeral port, so every send fails fast.
    fn unreachable_url() -> String {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        format!("http://{addr}/")
    }

    fn worker(drain: EventDrain, filter: LevelFilter) -> DeliveryWorker {
        let config = AppenderConfig {
            url: Some(unreachable_url()),
            ..AppenderConfig::default()
        };
        worker_for(&config, drain, filter)
    }

    fn worker_for(
        config: &AppenderConfig,
        drain: EventDrain,
        filter: LevelFilter,
    ) -> DeliveryWorker {
        let diagnostics = Diagnostics::new("worker-test");
        let builder =
            RequestBuilder::from_config(config, diagnostics.clone()).expect("builder");
        let client = DeliveryClient::new(
            ClientTimeouts {
                connect: Duration::from_millis(200),
                ..ClientTimeouts::default()
            },
            StatusRange::default(),
            diagnostics.clone(),
        );
        DeliveryWorker::new(drain, filter, builder, client, diagnostics)
    }

    #[test]
    fn exits_when_cancelled() {
        let (_queue, drain, mut cancel) = event_queue(1);
        let handle = worker(drain, LevelFilter::default()).spawn().expect("spawn");
        cancel.cancel();
        assert_eq!(handle.join().expect("join"), WorkerExit::Cancelled);
    }

    #[test]
    fn exits_when_producers_are_gone() {
        let (queue, drain, _cancel) = event_queue(1);
        let handle = worker(drain, LevelFilter::default()).spawn().expect("spawn");
        drop(queue);
        assert_eq!(handle.join().expect("join"), WorkerExit::Closed);
    }

    #[test]
    #[serial]
    fn failed_delivery_is_logged_and_loop_continues() {
        let mut logger = crate::test_logging::start();
        let (queue, drain, mut cancel) = event_queue(4);
        assert!(queue.enqueue(LogRecord::new("core", Level::Error, "first")));
        assert!(queue.enqueue(LogRecord::new("core", Level::Error, "second")));
        let handle = worker(drain, LevelFilter::default().with_level(Level::Error))
            .spawn()
            .expect("spawn");
        while !queue.is_empty() {
            thread::sleep(Duration::from_millis(10));
        }
        cancel.cancel();
        assert_eq!(handle.join().expect("join"), WorkerExit::Cancelled);

        let failures = std::iter::from_fn(|| logger.pop())
            .filter(|r| r.args().starts_with("worker-test: delivery of ERROR record failed"))
            .count();
        assert_eq!(failures, 2);
    }

    #[test]
    #[serial]
    fn panic_while_handling_a_record_faults_the_worker() {
        let mut logger = crate::test_logging::start();
        let (queue, drain, _cancel) = event_queue(4);
        assert!(queue.enqueue(LogRecord::new("core", Level::Error, FAULT_MESSAGE)));
        assert!(queue.enqueue(LogRecord::new("core", Level::Error, "never handled")));
        let handle = worker(drain, LevelFilter::default().with_level(Level::Error))
            .spawn()
            .expect("spawn");
        assert_eq!(handle.join().expect("join"), WorkerExit::Faulted);
        assert_eq!(queue.len(), 1);

        let records: Vec<_> = std::iter::from_fn(|| logger.pop())
            .filter(|r| r.args().starts_with("worker-test:"))
            .collect();
        assert!(records.iter().any(|r| {
            r.level() == log::Level::Error && r.args().contains("panicked while handling a record")
        }));
        assert!(!records.iter().any(|r| r.args().contains("delivery of")));
    }

    #[test]
    #[serial]
    fn build_failure_is_logged_and_loop_continues() {
        let mut logger = crate::test_logging::start();
        let spool = tempfile::tempdir().expect("tempdir");
        let missing = spool.path().join("missing");
        let config = AppenderConfig {
            url: Some(unreachable_url()),
            destination: Destination::CrashUpload(CrashUploadConfig {
                api_token: Some("token".into()),
                app_id: Some("42".into()),
                package_name: Some("com.example.app".into()),
                attachment_dir: Some(missing),
                ..CrashUploadConfig::default()
            }),
            ..AppenderConfig::default()
        };
        let (queue, drain, mut cancel) = event_queue(4);
        assert!(queue.enqueue(LogRecord::new("core", Level::Error, "first")));
        assert!(queue.enqueue(LogRecord::new("core", Level::Error, "second")));
        let handle = worker_for(&config, drain, LevelFilter::default().with_level(Level::Error))
            .spawn()
            .expect("spawn");
        while !queue.is_empty() {
            thread::sleep(Duration::from_millis(10));
        }
        cancel.cancel();
        assert_eq!(handle.join().expect("join"), WorkerExit::Cancelled);

        let failures = std::iter::from_fn(|| logger.pop())
            .filter(|r| r.args().starts_with("worker-test: failed to build request"))
            .count();
        assert_eq!(failures, 2);
    }

    #[test]
    #[serial]
    fn disabled_levels_are_filtered_at_drain_time() {
        let mut logger = crate::test_logging::start();
        let (queue, drain, mut cancel) = event_queue(4);
        assert!(queue.enqueue(LogRecord::new("core", Level::Warn, "quiet")));
        let handle = worker(drain, LevelFilter::default().with_level(Level::Error))
            .spawn()
            .expect("spawn");
        while !queue.is_empty() {
            thread::sleep(Duration::from_millis(10));
        }
        cancel.cancel();
        handle.join().expect("join");

        let records: Vec<_> = std::iter::from_fn(|| logger.pop())
            .filter(|r| r.args().starts_with("worker-test:"))
            .collect();
        assert!(records.iter().any(|r| r.args().contains("discarding WARN record")));
        assert!(!records.iter().any(|r| r.args().contains("delivery of")));
    }
}
