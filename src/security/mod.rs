//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (inside the gate, after CSRF validation):
//!     → rate_limit.rs (per-client, per-class token buckets)
//!     → Pass to downstream
//!
//! Outgoing response:
//!     → headers.rs (security headers for the configured profile)
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Fail closed: reject on any security check failure
//! - No trust in client input (forwarded headers only when configured)

pub mod headers;
pub mod rate_limit;
