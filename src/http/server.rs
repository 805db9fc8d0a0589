//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Mount the issuance endpoint next to the downstream router
//! - Wire up middleware (request ID, tracing, timeout, security headers,
//!   gate, session hook)
//! - Serve over plain TCP or TLS with graceful shutdown
//! - Sweep idle rate-limit buckets and expired session tokens for the
//!   lifetime of the server
//!
//! # Layer order (outermost first)
//! ```text
//! SetRequestId → PropagateRequestId → Trace → Timeout → SecurityHeaders
//!     → RequestGate → SessionHook → issuance endpoint | downstream
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GateConfig;
use crate::error::ConfigError;
use crate::gate::{GateState, RequestGateLayer};
use crate::http::issue::issue_token;
use crate::http::session::{session_refresh_middleware, SessionHook};
use crate::lifecycle::shutdown::wait as wait_for_shutdown;
use crate::net::tls::load_tls_config;
use crate::security::headers::{security_headers_middleware, SecurityHeaders};
use crate::security::rate_limit::RateLimiter;

/// How long in-flight TLS connections may drain after shutdown.
const TLS_DRAIN_SECS: u64 = 10;

/// HTTP server fronting a downstream router with the gate.
pub struct HttpServer {
    router: Router,
    config: GateConfig,
    state: Arc<GateState>,
}

impl HttpServer {
    /// Build the server. `downstream` must not define the issuance path.
    pub fn new(config: GateConfig, state: GateState, downstream: Router) -> Self {
        let state = Arc::new(state);
        let router = Self::build_router(&config, state.clone(), downstream);
        Self {
            router,
            config,
            state,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &GateConfig, state: Arc<GateState>, downstream: Router) -> Router {
        let issuance = Router::new()
            .route(&config.csrf.issue_path, get(issue_token))
            .with_state(state.clone());

        let session = Arc::new(SessionHook::new(config.session.cookie_name.clone()));
        let headers = Arc::new(SecurityHeaders::for_profile(config.header_profile()));

        downstream
            .merge(issuance)
            .layer(middleware::from_fn_with_state(session, session_refresh_middleware))
            .layer(RequestGateLayer::new(state))
            .layer(middleware::from_fn_with_state(headers, security_headers_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = self.spawn_sweeper(shutdown.resubscribe());
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await?;

        sweeper.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on the configured address until `shutdown` fires.
    pub async fn run_tls(self, shutdown: broadcast::Receiver<()>) -> Result<(), ConfigError> {
        let tls = self.config.listener.tls.clone().ok_or_else(|| {
            ConfigError::TlsMaterial("listener.tls is not configured".to_string())
        })?;
        let rustls = load_tls_config(&tls).await?;
        let addr: SocketAddr = self
            .config
            .listener
            .bind_address
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("listener.bind_address: {}", e)))?;

        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        let mut stop = shutdown.resubscribe();
        tokio::spawn(async move {
            let _ = stop.recv().await;
            drain.graceful_shutdown(Some(Duration::from_secs(TLS_DRAIN_SECS)));
        });

        let sweeper = self.spawn_sweeper(shutdown);
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(app)
            .await?;

        sweeper.abort();
        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    fn spawn_sweeper(&self, shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
        let period = Duration::from_secs(self.config.rate_limit.sweep_interval_secs);
        tokio::spawn(sweep_idle(self.state.clone(), period, shutdown))
    }
}

/// Periodically drop idle rate-limit buckets and expired session tokens
/// until shutdown.
async fn sweep_idle(state: Arc<GateState>, period: Duration, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let buckets = state.limiter.sweep();
                let sessions = state.sessions.sweep();
                if buckets + sessions > 0 {
                    tracing::debug!(buckets, sessions, "Swept idle gate state");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}
