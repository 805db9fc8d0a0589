//! CSRF token subsystem.
//!
//! # Data Flow
//! ```text
//! Issuance:
//!     token.rs (TokenCodec::generate)
//!     → store.rs (attach: Set-Cookie + x-csrf-token header)
//!     → client echoes the value back
//!
//! Validation (state-changing request):
//!     store.rs (read_from_cookie)      ─┐
//!     store.rs (read_from_submission)  ─┼→ token.rs (TokenCodec::equals)
//!       ↳ header, then form.rs fields  ─┘
//!
//! Session mode (per route class):
//!     session.rs (token keyed by the session cookie) → TokenCodec::equals
//! ```
//!
//! # Design Decisions
//! - Double-submit cookie pattern by default: no server-side token storage
//! - Session mode keeps a bounded, expiring server-side copy instead
//! - Framework access goes through exchange.rs capability traits
//! - Missing or malformed values are treated as absent (fail closed)

pub mod exchange;
pub mod form;
pub mod session;
pub mod store;
pub mod token;

pub use exchange::{RequestView, ResponseSink};
pub use session::SessionTokenStore;
pub use store::DoubleSubmitStore;
pub use token::{CsrfToken, TokenCodec};
