//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + environment
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → lifecycle/startup.rs builds the policy table and gate state
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; policy changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Production without `Secure` cookies is a startup error, not a warning

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::CsrfConfig;
pub use schema::Environment;
pub use schema::GateConfig;
pub use schema::ListenerConfig;
pub use schema::PolicyOverride;
pub use schema::RouteRuleConfig;
