#![allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    missing_debug_implementations,
    clippy::clone_on_ref_ptr,
    unreachable_pub,
    dead_code
)]
use missive_server::adapters::memory::InMemoryMessageStore;
use missive_server::api::{self, MgmtState};
use missive_server::config::{Config, StoreBackend};
use missive_server::services::message_store::MessageStore;
use missive_server::{AppBuilder, telemetry};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub fn get_test_config() -> Config {
    let mut config = Config::default();
    config.database.backend = StoreBackend::Memory;
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.mgmt_port = 0;
    config.dispatch.min_backoff_ms = 1;
    config.dispatch.max_backoff_ms = 10;
    config
}

pub struct TestApp {
    pub server_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub store: Arc<InMemoryMessageStore>,
    pub config: Config,
    pub shutdown_tx: watch::Sender<bool>,
    pub worker_tasks: Vec<JoinHandle<()>>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        telemetry::init_test_telemetry();

        let store = Arc::new(InMemoryMessageStore::new());
        let app = AppBuilder::new(config.clone()).with_store(store.clone()).build().unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let api_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_url = format!("http://{}", api_listener.local_addr().unwrap());
        let mgmt_url = format!("http://{}", mgmt_listener.local_addr().unwrap());

        let app_router = api::app_router(app.services);
        let mgmt_router = api::mgmt_router(MgmtState { health_service: app.health_service });

        let mut api_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(api_listener, app_router)
                .with_graceful_shutdown(async move {
                    let _ = api_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        let mut mgmt_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_router)
                .with_graceful_shutdown(async move {
                    let _ = mgmt_rx.wait_for(|&s| s).await;
                })
                .await
                .unwrap();
        });

        let worker_tasks = app.workers.spawn_all(shutdown_rx);

        Self { server_url, mgmt_url, client: reqwest::Client::new(), store, config, shutdown_tx, worker_tasks }
    }

    pub async fn send_text(&self, text: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/messages/send", self.server_url))
            .query(&[("text", text)])
            .send()
            .await
            .unwrap()
    }

    pub async fn list(&self, status: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(format!("{}/messages", self.server_url));
        if let Some(status) = status {
            request = request.query(&[("status", status)]);
        }
        request.send().await.unwrap()
    }

    pub async fn list_json(&self, status: Option<&str>) -> serde_json::Value {
        let resp = self.list(status).await;
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        resp.json().await.unwrap()
    }

    /// Polls the store until it holds `expected` messages, since persistence is asynchronous.
    pub async fn wait_for_message_count(&self, expected: usize) {
        let start = std::time::Instant::now();
        loop {
            let count = self.store.list_by_status(None).await.unwrap().len();
            if count == expected {
                return;
            }
            assert!(
                start.elapsed() < Duration::from_secs(5),
                "Timed out waiting for {expected} messages, store holds {count}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Signals shutdown and waits for the dispatch worker to drain.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.worker_tasks {
            tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        }
    }
}
