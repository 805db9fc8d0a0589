//! Request gate: CSRF double-submit protection and per-route policies in
//! front of an axum application.

pub mod config;
pub mod csrf;
pub mod error;
pub mod gate;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod policy;
pub mod routing;
pub mod security;

pub use config::schema::GateConfig;
pub use error::{ConfigError, GateRejection};
pub use gate::{GateState, RequestGateLayer};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
