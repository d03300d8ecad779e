#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::database::message_repo::MessageRepository;
use crate::adapters::memory::InMemoryMessageStore;
use crate::api::ServiceContainer;
use crate::config::{Config, StoreBackend};
use crate::domain::clock::{Clock, SystemClock};
use crate::services::dispatch_queue::DispatchQueue;
use crate::services::health_service::HealthService;
use crate::services::message_service::MessageService;
use crate::services::message_store::MessageStore;
use crate::services::send_handler::SendHandler;
use crate::workers::DispatchWorker;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Background tasks owned by the application.
#[derive(Debug)]
pub struct Workers {
    dispatch: DispatchWorker,
}

impl Workers {
    /// Spawns every background worker, returning their handles.
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![tokio::spawn(self.dispatch.run(shutdown_rx).instrument(tracing::info_span!("dispatch_worker")))]
    }
}

/// Fully wired application components, ready to be served.
#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
    pub workers: Workers,
}

/// Wires the application from explicitly supplied collaborators.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    store: Option<Arc<dyn MessageStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, store: None, clock: None }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn MessageStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the services and workers.
    ///
    /// # Errors
    /// Returns an error if no message store was supplied.
    pub fn build(self) -> anyhow::Result<App> {
        let store = self.store.ok_or_else(|| anyhow::anyhow!("A message store is required to build the app"))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let (queue, rx) = DispatchQueue::new(self.config.dispatch.queue_capacity);
        let handler = SendHandler::new(Arc::clone(&store), clock, &self.config.dispatch);
        let dispatch = DispatchWorker::new(rx, handler, &self.config.dispatch);

        let message_service = MessageService::new(queue.clone(), Arc::clone(&store), self.config.messages);
        let health_service = HealthService::new(store, queue, self.config.health);

        Ok(App { services: ServiceContainer { message_service }, health_service, workers: Workers { dispatch } })
    }
}

/// Creates the message store selected in the configuration, running migrations for Postgres.
///
/// # Errors
/// Returns an error if the database is unreachable or migrations fail.
pub async fn init_store(config: &Config) -> anyhow::Result<Arc<dyn MessageStore>> {
    match config.database.backend {
        StoreBackend::Postgres => {
            let pool = adapters::database::init_pool(&config.database).await?;
            adapters::database::run_migrations(&pool).await?;
            tracing::info!("Database migrations applied");
            Ok(Arc::new(MessageRepository::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory message store; messages are lost on restart");
            Ok(Arc::new(InMemoryMessageStore::new()))
        }
    }
}

/// Flips the shutdown signal on Ctrl-C or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
            () = terminate => tracing::info!("Received SIGTERM, shutting down"),
        }

        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through `tracing` so they reach the configured log sinks.
pub fn setup_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info.location().map(ToString::to_string).unwrap_or_default();
        tracing::error!(panic = %info, location = %location, "Panic occurred");
        default_hook(info);
    }));
}
