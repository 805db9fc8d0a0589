//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Probe entropy → Build gate state
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Broadcast → server stops accepting and drains → sweeper exits
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, the gate never serves
//!   half-configured
//! - One broadcast channel fans the shutdown out to every task

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
