//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use json_validation_service::{JsonValidationService, ServiceConfig, Shutdown};
use tokio::net::TcpListener;

/// A service running on an ephemeral port.
pub struct TestService {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestService {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Start a service with `config` on 127.0.0.1 and an OS-assigned port.
pub async fn start_service(config: ServiceConfig) -> TestService {
    let service = JsonValidationService::with_config(config).expect("valid test config");
    let shutdown = service.shutdown();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        if let Err(e) = service.start_on(listener).await {
            panic!("service failed: {e}");
        }
    });

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    TestService {
        addr,
        shutdown,
        client,
        handle,
    }
}

#[allow(dead_code)]
pub fn person_schema() -> serde_json::Value {
    serde_json::json!({
        "$id": "https://example.com/person.json",
        "title": "Person",
        "type": "object",
        "required": ["name", "age"],
        "properties": {
            "name": {"type": "string", "minLength": 1},
            "age": {"type": "integer", "minimum": 0}
        }
    })
}
