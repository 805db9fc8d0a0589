//! Network layer subsystem.
//!
//! Plain TCP listeners are bound directly by the caller; this module only
//! holds what TLS termination needs.

pub mod tls;
