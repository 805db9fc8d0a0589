//! Route classification subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → classifier.rs (ordered rule scan)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: exactly one RouteClass (Default when nothing matched)
//!
//! Rule Compilation (at startup):
//!     RouteRuleConfig[] (or the built-in table)
//!     → Compile matchers
//!     → Freeze as immutable RouteClassifier
//! ```
//!
//! # Design Decisions
//! - Rules compiled at startup, immutable at runtime
//! - No regex in hot path (prefix, segment and suffix matching only)
//! - Deterministic: same input always yields the same class
//! - First match wins; specific rules must be listed before broad ones

pub mod classifier;
pub mod matcher;

pub use classifier::RouteClassifier;
