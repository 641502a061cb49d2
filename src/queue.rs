//! Hand-off queue between producers and the delivery worker.
//!
//! [`event_queue`] returns three halves:
//!
//! - [`EventQueue`]: cloneable producer side. [`EventQueue::enqueue`] never
//!   blocks; a full queue (or a rendezvous queue with nobody waiting) drops
//!   the record and bumps a counter.
//! - [`EventDrain`]: worker side. [`EventDrain::dequeue`] blocks until a
//!   record arrives or the queue is cancelled.
//! - [`CancelToken`]: cancelling (or dropping) it wakes a blocked
//!   `dequeue` and makes every later call return [`Dequeued::Cancelled`].
//!
//! A capacity of zero yields crossbeam's zero-capacity channel: an enqueue
//! only succeeds when the worker is parked inside `dequeue`.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded, select};

use crate::{log_record::LogRecord, rate_limited_warner::RateLimitedWarner};

/// Outcome of [`EventDrain::dequeue`].
#[derive(Debug)]
pub enum Dequeued {
    Record(LogRecord),
    /// The cancel token fired.
    Cancelled,
    /// Every producer handle has been dropped.
    Closed,
}

/// Producer half of the queue.
#[derive(Clone, Debug)]
pub struct EventQueue {
    tx: Sender<LogRecord>,
    drops: Arc<RateLimitedWarner>,
}

impl EventQueue {
    /// Offer `record` to the worker without blocking.
    ///
    /// Returns `false` when the record was dropped.
    pub fn enqueue(&self, record: LogRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.drops.record_drop();
                false
            }
        }
    }

    /// Fixed capacity chosen at construction (zero for rendezvous).
    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(usize::MAX)
    }

    /// Records currently buffered.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// Worker half of the queue.
#[derive(Debug)]
pub struct EventDrain {
    rx: Receiver<LogRecord>,
    cancel_rx: Receiver<()>,
    drops: Arc<RateLimitedWarner>,
}

impl EventDrain {
    /// Block until a record is available or the queue is cancelled.
    ///
    /// Cancellation is checked before blocking so a saturated queue cannot
    /// starve it through `select!`'s random choice.
    pub fn dequeue(&self) -> Dequeued {
        if self.is_cancelled() {
            return Dequeued::Cancelled;
        }
        select! {
            recv(self.cancel_rx) -> _ => Dequeued::Cancelled,
            recv(self.rx) -> msg => match msg {
                Ok(record) => Dequeued::Record(record),
                Err(_) => Dequeued::Closed,
            },
        }
    }

    /// `true` once the paired [`CancelToken`] has fired or been dropped.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.cancel_rx.try_recv(),
            Ok(()) | Err(TryRecvError::Disconnected)
        )
    }

    /// Drop counter shared with the producer side.
    pub fn drops(&self) -> &RateLimitedWarner {
        &self.drops
    }
}

/// Wakes and stops an [`EventDrain`].
#[derive(Debug)]
pub struct CancelToken {
    tx: Option<Sender<()>>,
}

impl CancelToken {
    /// Signal cancellation. Idempotent.
    pub fn cancel(&mut self) {
        self.tx.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.is_none()
    }
}

/// Build a queue with the given capacity (zero for rendezvous hand-off).
pub fn event_queue(capacity: usize) -> (EventQueue, EventDrain, CancelToken) {
    event_queue_with_warner(capacity, Arc::new(RateLimitedWarner::default()))
}

pub(crate) fn event_queue_with_warner(
    capacity: usize,
    drops: Arc<RateLimitedWarner>,
) -> (EventQueue, EventDrain, CancelToken) {
    let (tx, rx) = bounded(capacity);
    let (cancel_tx, cancel_rx) = bounded(0);
    (
        EventQueue {
            tx,
            drops: Arc::clone(&drops),
        },
        EventDrain {
            rx,
            cancel_rx,
            drops,
        },
        CancelToken {
            tx: Some(cancel_tx),
        },
    )
}
