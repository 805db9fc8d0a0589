//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! gate, issuance endpoint, server
//!     → logging.rs (structured tracing events, pretty or JSON)
//!     → metrics.rs (counters and histograms)
//!
//! Consumers:
//!     → stdout (log aggregation)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID from tower-http flows through every gate log line
//! - Metrics go through the `metrics` facade; without an installed
//!   recorder they are no-ops
//! - Token values never appear in logs or labels

pub mod logging;
pub mod metrics;
