use crate::config::MessagesConfig;
use crate::domain::message::{Message, MessageStatus, MessageText};
use crate::error::{AppError, Result};
use crate::services::dispatch_queue::DispatchQueue;
use crate::services::message_store::MessageStore;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;

#[derive(Clone, Debug)]
struct Metrics {
    submissions_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("missive-server");
        Self {
            submissions_total: meter
                .u64_counter("missive_message_submissions_total")
                .with_description("Message submissions received, by outcome")
                .build(),
        }
    }
}

/// Entry point for the HTTP layer: validates submissions, hands them to the dispatch queue
/// and reads stored messages back.
#[derive(Clone, Debug)]
pub struct MessageService {
    queue: DispatchQueue,
    store: Arc<dyn MessageStore>,
    config: MessagesConfig,
    metrics: Metrics,
}

impl MessageService {
    #[must_use]
    pub fn new(queue: DispatchQueue, store: Arc<dyn MessageStore>, config: MessagesConfig) -> Self {
        Self { queue, store, config, metrics: Metrics::new() }
    }

    /// Validates `text` and queues it for persistence. Returns as soon as the task is queued.
    ///
    /// # Errors
    /// Returns `AppError::Validation` if the text is missing, blank or too long; nothing is
    /// queued in that case.
    /// Returns `AppError::Dispatch` if the dispatch queue rejects the task.
    #[tracing::instrument(err(level = "warn"), skip(self, text))]
    pub fn submit(&self, text: Option<String>) -> Result<()> {
        let text = match MessageText::parse(text.unwrap_or_default(), self.config.max_text_length) {
            Ok(text) => text,
            Err(e) => {
                self.metrics.submissions_total.add(1, &[KeyValue::new("status", "invalid")]);
                return Err(AppError::Validation(e.to_string()));
            }
        };

        match self.queue.enqueue(text) {
            Ok(()) => {
                self.metrics.submissions_total.add(1, &[KeyValue::new("status", "accepted")]);
                Ok(())
            }
            Err(e) => {
                self.metrics.submissions_total.add(1, &[KeyValue::new("status", "dispatch_failed")]);
                Err(e.into())
            }
        }
    }

    /// Lists stored messages, filtered by `status` when it is present and non-empty.
    ///
    /// A status no message can have matches nothing, so it yields an empty list without
    /// touching the store.
    ///
    /// # Errors
    /// Returns `AppError::Persistence` if the store cannot be queried.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn list(&self, status: Option<&str>) -> Result<Vec<Message>> {
        let status = match status.filter(|s| !s.is_empty()).map(str::parse::<MessageStatus>) {
            Some(Ok(status)) => Some(status),
            Some(Err(e)) => {
                tracing::debug!(error = %e, "Status filter matches no message");
                return Ok(Vec::new());
            }
            None => None,
        };

        let messages = self.store.list_by_status(status).await?;
        tracing::debug!(count = messages.len(), "Listed messages");
        Ok(messages)
    }
}
