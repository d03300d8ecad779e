use crate::config::DispatchConfig;
use crate::domain::message::SendMessage;
use crate::services::send_handler::SendHandler;
use opentelemetry::{
    global,
    metrics::{Counter, UpDownCounter},
};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc, watch};
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    in_flight: UpDownCounter<i64>,
    dropped_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("missive-server");
        Self {
            in_flight: meter
                .i64_up_down_counter("missive_dispatch_in_flight")
                .with_description("Send tasks currently being persisted")
                .build(),
            dropped_total: meter
                .u64_counter("missive_dispatch_dropped_total")
                .with_description("Send tasks abandoned after the send handler gave up")
                .build(),
        }
    }
}

/// Consumer side of the send pipeline.
///
/// Pulls send tasks off the dispatch queue in FIFO order and runs the send handler for each,
/// with at most `worker_concurrency` tasks in flight. With a concurrency of one, messages are
/// committed in submission order.
///
/// On shutdown the queue is closed to new submissions, every task already buffered is still
/// handled, and the worker waits for in-flight tasks before returning.
#[derive(Debug)]
pub struct DispatchWorker {
    rx: mpsc::Receiver<SendMessage>,
    handler: SendHandler,
    semaphore: Arc<Semaphore>,
    permits: u32,
    metrics: Metrics,
}

impl DispatchWorker {
    #[must_use]
    pub fn new(rx: mpsc::Receiver<SendMessage>, handler: SendHandler, config: &DispatchConfig) -> Self {
        let permits = u32::try_from(config.worker_concurrency.max(1)).unwrap_or(u32::MAX);
        Self { rx, handler, semaphore: Arc::new(Semaphore::new(permits as usize)), permits, metrics: Metrics::new() }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(concurrency = self.permits, "Dispatch worker started");

        while !*shutdown.borrow() {
            tokio::select! {
                biased;
                task = self.rx.recv() => {
                    let Some(task) = task else {
                        tracing::warn!("All dispatch queue handles dropped");
                        break;
                    };
                    self.dispatch(task).await;
                }
                res = shutdown.changed() => {
                    if res.is_err() {
                        break;
                    }
                }
            }
        }

        self.rx.close();
        let mut drained = 0_usize;
        while let Some(task) = self.rx.recv().await {
            self.dispatch(task).await;
            drained += 1;
        }
        if drained > 0 {
            tracing::info!(count = drained, "Drained buffered send tasks");
        }

        if self.semaphore.acquire_many(self.permits).await.is_err() {
            tracing::warn!("Dispatch semaphore closed before in-flight tasks finished");
        }
        tracing::info!("Dispatch worker shutting down...");
    }

    async fn dispatch(&self, task: SendMessage) {
        let Ok(permit) = Arc::clone(&self.semaphore).acquire_owned().await else {
            tracing::warn!("Dispatch semaphore closed, handling send task inline");
            Self::process(self.handler.clone(), self.metrics.clone(), task).await;
            return;
        };

        let handler = self.handler.clone();
        let metrics = self.metrics.clone();
        tokio::spawn(
            async move {
                let _permit = permit;
                Self::process(handler, metrics, task).await;
            }
            .instrument(tracing::debug_span!("dispatch_send_task")),
        );
    }

    async fn process(handler: SendHandler, metrics: Metrics, task: SendMessage) {
        let _in_flight = InFlightGuard::new(metrics.in_flight.clone());
        // The handler logs the failure with the message uuid.
        if handler.handle(task).await.is_err() {
            metrics.dropped_total.add(1, &[]);
        }
    }
}

/// Tracks one running send task; released on completion or unwinding.
#[derive(Debug)]
struct InFlightGuard {
    in_flight: UpDownCounter<i64>,
}

impl InFlightGuard {
    fn new(in_flight: UpDownCounter<i64>) -> Self {
        in_flight.add(1, &[]);
        Self { in_flight }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.add(-1, &[]);
        if std::thread::panicking() {
            tracing::error!("Send task panicked, message was not stored");
        }
    }
}
