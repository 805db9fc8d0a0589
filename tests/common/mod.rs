//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use request_gate::config::GateConfig;
use request_gate::lifecycle::startup;
use request_gate::{HttpServer, Shutdown};

/// A running gate in front of a counting downstream.
pub struct TestGate {
    pub addr: SocketAddr,
    pub calls: Arc<AtomicUsize>,
    pub shutdown: Shutdown,
}

#[allow(dead_code)]
impl TestGate {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Drop for TestGate {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Downstream routes that count every invocation and report the body size.
pub fn counting_downstream(calls: Arc<AtomicUsize>) -> Router {
    let handler = move |body: Bytes| {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            format!("received {} bytes", body.len())
        }
    };

    Router::new()
        .route("/api/items", post(handler.clone()).get(|| async { "items" }))
        .route("/api/auth/login", post(handler.clone()))
        .route("/api/properties/{id}/images", post(handler.clone()))
        .route("/login", post(handler.clone()))
        .route("/health", get(|| async { "ok" }))
        .route("/dashboard", post(handler))
}

/// Start the gate on an ephemeral local port.
pub async fn start_gate(mut config: GateConfig) -> TestGate {
    config.listener.bind_address = "127.0.0.1:0".to_string();
    let state = startup::prepare(&config).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let server = HttpServer::new(config, state, counting_downstream(calls.clone()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestGate {
        addr,
        calls,
        shutdown,
    }
}
