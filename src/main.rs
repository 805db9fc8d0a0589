//! Request gate
//!
//! CSRF double-submit protection and per-route policies in front of an
//! axum application, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────┐
//!                          │                 REQUEST GATE                 │
//!                          │                                              │
//!     Client Request       │  ┌─────────┐   ┌────────────┐   ┌─────────┐  │
//!     ─────────────────────┼─▶│  http   │──▶│  routing   │──▶│ policy  │  │
//!                          │  │ server  │   │ classifier │   │  table  │  │
//!                          │  └─────────┘   └────────────┘   └────┬────┘  │
//!                          │                                      │       │
//!                          │                                      ▼       │
//!                          │                 ┌────────────┐  ┌─────────┐  │
//!                          │                 │ rate limit │◀─│  csrf   │  │
//!                          │                 └─────┬──────┘  └─────────┘  │
//!                          │                       ▼                      │
//!     Client Response      │  ┌─────────┐   ┌────────────┐                │
//!     ◀────────────────────┼──│finalize │◀──│ downstream │                │
//!                          │  │ cookie  │   │   router   │                │
//!                          │  └─────────┘   └────────────┘                │
//!                          └──────────────────────────────────────────────┘
//! ```
//!
//! The bundled downstream echoes requests back; embed the library to put a
//! real application behind the gate.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{body::Bytes, http::Method, http::Uri, Extension, Json, Router};
use clap::Parser;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use request_gate::config::Environment;
use request_gate::http::session::SessionPresence;
use request_gate::lifecycle::startup;
use request_gate::observability::{logging, metrics};
use request_gate::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "request-gate", version, about = "CSRF and route-policy gate")]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "REQUEST_GATE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured environment (development or production).
    #[arg(short, long, env = "REQUEST_GATE_ENV")]
    environment: Option<Environment>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = startup::resolve_config(args.config.as_deref(), args.environment)?;
    logging::init_logging(&config.observability)?;

    tracing::info!("request-gate v{} starting", env!("CARGO_PKG_VERSION"));

    let state = startup::prepare(&config)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        tls = config.listener.tls.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let tls = config.listener.tls.is_some();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config, state, echo_router());

    if tls {
        server.run_tls(shutdown.subscribe()).await?;
    } else {
        let listener = TcpListener::bind(&bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Listening for connections");
        server.run(listener, shutdown.subscribe()).await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn echo_router() -> Router {
    Router::new().fallback(echo)
}

async fn echo(
    method: Method,
    uri: Uri,
    Extension(SessionPresence(session)): Extension<SessionPresence>,
    body: Bytes,
) -> Json<Value> {
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "bytes": body.len(),
        "session": session,
    }))
}
