//! Routing-event queue.
//!
//! # Data Flow
//! ```text
//! director (one publish per accepted request)
//!     → EventPublisher (blocks while the queue is full)
//!     → bounded FIFO
//!     → EventStream (external scale controller)
//! ```
//!
//! # Design Decisions
//! - FIFO order follows acceptance order; duplicates are expected
//! - Producers block on a full queue: backpressure into the handler task
//! - The queue closes exactly once, during shutdown, after in-flight
//!   publishers have drained; the consumer sees `None` only after all
//!   pending items have been delivered
//! - Consumers hold a read-only stream and can never close the queue

use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A routing event published for each accepted request.
///
/// `host` is the resolved upstream authority (`hostname:port`); `path` is
/// the joined, percent-decoded request path. Events carry no identity and
/// one is published per incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingEvent {
    pub host: String,
    pub path: String,
}

/// Error returned when a publish cannot complete because the consumer
/// dropped its stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishError;

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "routing-event stream was dropped by the consumer")
    }
}

impl std::error::Error for PublishError {}

/// Bounded FIFO of [`RoutingEvent`]s.
///
/// Owned by the proxy handle. Publisher clones are handed to request
/// handlers; the single consumer stream is taken once via
/// [`take_stream`](Self::take_stream).
pub struct EventQueue {
    capacity: usize,
    tx: Mutex<Option<mpsc::Sender<RoutingEvent>>>,
    rx: Mutex<Option<mpsc::Receiver<RoutingEvent>>>,
}

impl EventQueue {
    /// Create a queue with the given capacity. Capacity must be at least 1;
    /// construction options are validated before this is called.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            capacity,
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Obtain a publisher handle, or `None` after the queue was closed.
    pub fn publisher(&self) -> Option<EventPublisher> {
        let guard = self.tx.lock().expect("event queue sender lock poisoned");
        guard.as_ref().map(|tx| EventPublisher { tx: tx.clone() })
    }

    /// Take the consumer stream. Yields `Some` exactly once.
    pub fn take_stream(&self) -> Option<EventStream> {
        let mut guard = self.rx.lock().expect("event queue receiver lock poisoned");
        guard.take().map(|rx| EventStream { rx })
    }

    /// Drop the queue's own sender. The stream terminates once every
    /// in-flight publisher clone has been dropped as well. Idempotent.
    pub fn close(&self) {
        let mut guard = self.tx.lock().expect("event queue sender lock poisoned");
        guard.take();
    }
}

/// Write side of the queue, cloned into each request handler.
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<RoutingEvent>,
}

impl EventPublisher {
    /// Publish an event, waiting while the queue is full.
    pub async fn publish(&self, event: RoutingEvent) -> Result<(), PublishError> {
        self.tx.send(event).await.map_err(|_| PublishError)
    }

    /// Publish from a task that survives the caller being dropped.
    ///
    /// hyper drops the handler future when the client disconnects; the
    /// routing event is as important as the request itself, so the send
    /// runs in its own task. Awaiting the returned handle preserves
    /// backpressure for callers that live long enough.
    pub fn publish_detached(&self, event: RoutingEvent) -> JoinHandle<Result<(), PublishError>> {
        let publisher = self.clone();
        tokio::spawn(async move { publisher.publish(event).await })
    }
}

/// Read side of the queue, held by the external scale controller.
///
/// Yields events in FIFO order; `None` means the proxy has terminated and
/// no further events will ever be observed.
pub struct EventStream {
    rx: mpsc::Receiver<RoutingEvent>,
}

impl EventStream {
    /// Receive the next event, or `None` once the queue is closed and
    /// drained.
    pub async fn recv(&mut self) -> Option<RoutingEvent> {
        self.rx.recv().await
    }

    /// Non-blocking variant; `Err` covers both "empty" and "closed".
    pub fn try_recv(&mut self) -> Result<RoutingEvent, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}
