use crate::config::HealthConfig;
use crate::services::dispatch_queue::DispatchQueue;
use crate::services::message_store::MessageStore;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub status: Gauge<i64>,
    pub queue_depth: Gauge<u64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("missive-server");
        Self {
            status: meter
                .i64_gauge("missive_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
            queue_depth: meter
                .u64_gauge("missive_dispatch_queue_depth")
                .with_description("Send tasks waiting in the dispatch queue at the last readiness check")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct HealthService {
    store: Arc<dyn MessageStore>,
    queue: DispatchQueue,
    config: HealthConfig,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(store: Arc<dyn MessageStore>, queue: DispatchQueue, config: HealthConfig) -> Self {
        Self { store, queue, config, metrics: Metrics::new() }
    }

    /// Checks store connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the store is unreachable.
    pub async fn check_db(&self) -> Result<(), String> {
        let store_timeout = Duration::from_millis(self.config.store_timeout_ms);

        match timeout(store_timeout, self.store.ping()).await {
            Ok(Ok(())) => {
                self.metrics.status.record(1, &[KeyValue::new("component", "database")]);
                Ok(())
            }
            Ok(Err(e)) => {
                self.metrics.status.record(0, &[KeyValue::new("component", "database")]);
                Err(format!("Database connection failed: {e}"))
            }
            Err(_) => {
                self.metrics.status.record(0, &[KeyValue::new("component", "database")]);
                Err("Database connection timed out".to_string())
            }
        }
    }

    /// Checks that the dispatch worker is still consuming.
    ///
    /// # Errors
    /// Returns a string describing the failure if the dispatch queue is closed.
    pub fn check_queue(&self) -> Result<(), String> {
        let depth = self.queue.depth();
        self.metrics.queue_depth.record(depth as u64, &[]);

        if self.queue.is_closed() {
            self.metrics.status.record(0, &[KeyValue::new("component", "queue")]);
            Err("Dispatch queue is closed".to_string())
        } else {
            self.metrics.status.record(1, &[KeyValue::new("component", "queue")]);
            Ok(())
        }
    }
}
