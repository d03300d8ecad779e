use crate::domain::message::{MessageText, SendMessage};
use crate::error::DispatchError;
use opentelemetry::{KeyValue, global, metrics::Counter};
use tokio::sync::mpsc;

#[derive(Clone, Debug)]
struct Metrics {
    enqueued_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("missive-server");
        Self {
            enqueued_total: meter
                .u64_counter("missive_dispatch_enqueued_total")
                .with_description("Send tasks offered to the dispatch queue, by outcome")
                .build(),
        }
    }
}

/// Producer side of the send pipeline.
///
/// `DispatchQueue` decouples request handling from persistence: submissions are pushed onto
/// a bounded FIFO channel and picked up by the dispatch worker. Enqueueing never waits, so a
/// slow store shows up as a full queue rather than as request latency. Handles are cheap to
/// clone and safe to share between request tasks.
#[derive(Clone, Debug)]
pub struct DispatchQueue {
    tx: mpsc::Sender<SendMessage>,
    metrics: Metrics,
}

impl DispatchQueue {
    /// Creates a queue with room for `capacity` pending tasks, returning the consumer side
    /// alongside it.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SendMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, metrics: Metrics::new() }, rx)
    }

    /// Hands a send task to the worker without waiting for it to be persisted.
    ///
    /// # Errors
    /// Returns `DispatchError::Full` if the buffer is at capacity.
    /// Returns `DispatchError::Closed` if the worker has stopped consuming.
    #[tracing::instrument(level = "debug", skip(self, text), fields(text.len = text.as_str().len()))]
    pub fn enqueue(&self, text: MessageText) -> Result<(), DispatchError> {
        match self.tx.try_send(SendMessage::new(text)) {
            Ok(()) => {
                self.metrics.enqueued_total.add(1, &[KeyValue::new("status", "success")]);
                tracing::debug!(depth = self.depth(), "Send task enqueued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.enqueued_total.add(1, &[KeyValue::new("status", "full")]);
                tracing::warn!(capacity = self.tx.max_capacity(), "Dispatch queue full, rejecting send task");
                Err(DispatchError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.enqueued_total.add(1, &[KeyValue::new("status", "closed")]);
                tracing::error!("Dispatch queue closed, rejecting send task");
                Err(DispatchError::Closed)
            }
        }
    }

    /// Number of tasks waiting to be picked up by the worker.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
