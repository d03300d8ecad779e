use crate::config::DispatchConfig;
use crate::domain::clock::Clock;
use crate::domain::message::{Message, NewMessage, SendMessage};
use crate::error::PersistenceError;
use crate::services::message_store::MessageStore;
use backon::{ExponentialBuilder, Retryable};
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
struct Metrics {
    persisted_total: Counter<u64>,
    retries_total: Counter<u64>,
    persist_duration_seconds: Histogram<f64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("missive-server");
        Self {
            persisted_total: meter
                .u64_counter("missive_messages_persisted_total")
                .with_description("Send tasks handled by the send handler, by outcome")
                .build(),
            retries_total: meter
                .u64_counter("missive_message_persist_retries_total")
                .with_description("Persistence attempts retried after a transient store failure")
                .build(),
            persist_duration_seconds: meter
                .f64_histogram("missive_message_persist_duration_seconds")
                .with_description("Time from picking up a send task to its final outcome")
                .build(),
        }
    }
}

/// Turns queued send tasks into stored messages.
#[derive(Clone, Debug)]
pub struct SendHandler {
    store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
    retry: ExponentialBuilder,
    metrics: Metrics,
}

impl SendHandler {
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, clock: Arc<dyn Clock>, config: &DispatchConfig) -> Self {
        let retry = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(config.min_backoff_ms))
            .with_max_delay(Duration::from_millis(config.max_backoff_ms))
            .with_max_times(config.max_retries);

        Self { store, clock, retry, metrics: Metrics::new() }
    }

    /// Builds a new `sent` message for the task and commits it to the store.
    ///
    /// The message identity and timestamp are fixed before the first attempt, so a retried
    /// commit writes the same record.
    ///
    /// # Errors
    /// Returns `PersistenceError` once the store has failed permanently or retries are exhausted.
    #[tracing::instrument(
        name = "handle_send",
        skip(self, task),
        fields(message.uuid = tracing::field::Empty)
    )]
    pub async fn handle(&self, task: SendMessage) -> Result<Message, PersistenceError> {
        let start = Instant::now();
        let message = NewMessage::new(task.text, self.clock.now());
        tracing::Span::current().record("message.uuid", tracing::field::display(message.uuid()));

        let result = (|| async { self.store.create(&message).await })
            .retry(&self.retry)
            .when(PersistenceError::is_transient)
            .notify(|e, delay| {
                self.metrics.retries_total.add(1, &[]);
                tracing::warn!(error = %e, ?delay, "Failed to persist message, retrying");
            })
            .await;

        self.metrics.persist_duration_seconds.record(start.elapsed().as_secs_f64(), &[]);
        match &result {
            Ok(stored) => {
                tracing::debug!(message.id = stored.id(), "Message persisted");
                self.metrics.persisted_total.add(1, &[KeyValue::new("status", "success")]);
            }
            Err(e) => {
                self.metrics.persisted_total.add(1, &[KeyValue::new("status", "failure")]);
                tracing::error!(
                    message.uuid = %message.uuid(),
                    error = %e,
                    "Failed to persist message, giving up"
                );
            }
        }

        result
    }
}
