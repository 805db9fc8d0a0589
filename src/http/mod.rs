//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware stack)
//!     → gate (classification, CSRF, rate limit)
//!     → session.rs (session refresh hook)
//!     → issue.rs (token endpoint) or the downstream router
//! ```

pub mod issue;
pub mod server;
pub mod session;

pub use server::HttpServer;
