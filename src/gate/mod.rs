//! Request gate subsystem.
//!
//! # Data Flow
//! ```text
//! Request
//!     → classify method + path (routing::RouteClassifier)
//!     → Bypass (safe methods only)? delegate untouched
//!     → CSRF check for state-changing methods
//!       (csrf::DoubleSubmitStore, or csrf::SessionTokenStore in session mode)
//!     → rate limit (security::RateLimiter)
//!     → downstream
//!     → finalize token cookie per TokenRefresh
//! ```
//!
//! # Design Decisions
//! - State is built once at startup and shared read-only behind an `Arc`
//! - Rejections short-circuit; the downstream never sees a rejected request
//! - Form bodies are only buffered when the token is not in a header

pub mod layer;

use std::sync::Arc;

use crate::config::GateConfig;
use crate::csrf::{DoubleSubmitStore, SessionTokenStore, TokenCodec};
use crate::error::ConfigError;
use crate::policy::PolicyTable;
use crate::routing::RouteClassifier;
use crate::security::rate_limit::{NoopRateLimiter, RateLimiter, TokenBucketLimiter};

pub use layer::{RequestGate, RequestGateLayer};

/// Everything the gate needs per request, immutable after startup.
pub struct GateState {
    pub classifier: RouteClassifier,
    pub policies: PolicyTable,
    pub codec: TokenCodec,
    pub store: DoubleSubmitStore,
    pub sessions: SessionTokenStore,
    pub limiter: Arc<dyn RateLimiter>,
    pub trust_forwarded: bool,
}

impl GateState {
    /// Build gate state from an already validated configuration.
    pub fn from_config(config: &GateConfig) -> Result<Self, ConfigError> {
        let limiter: Arc<dyn RateLimiter> = if config.rate_limit.enabled {
            Arc::new(TokenBucketLimiter::new())
        } else {
            Arc::new(NoopRateLimiter)
        };

        Ok(Self {
            classifier: RouteClassifier::from_config(&config.routes),
            policies: PolicyTable::from_config(&config.policies, config.rate_limit.enabled),
            codec: TokenCodec::new(config.csrf.token_bytes),
            store: DoubleSubmitStore::from_config(&config.csrf, config.cookie_secure())?,
            sessions: SessionTokenStore::from_config(&config.csrf, &config.session),
            limiter,
            trust_forwarded: config.rate_limit.trust_forwarded_headers,
        })
    }

    /// Replace the rate limiter.
    pub fn with_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }
}

impl std::fmt::Debug for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateState")
            .field("classifier", &self.classifier)
            .field("policies", &self.policies)
            .field("codec", &self.codec)
            .field("store", &self.store)
            .field("sessions", &self.sessions.len())
            .field("trust_forwarded", &self.trust_forwarded)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RouteClass;

    #[test]
    fn test_from_default_config() {
        let state = GateState::from_config(&GateConfig::default()).unwrap();
        assert_eq!(state.classifier.classify("/api/x"), RouteClass::Api);
        assert_eq!(state.sessions.session_cookie(), "session");
        assert!(state.sessions.is_empty());
        assert!(!state.store.is_secure());
        assert_eq!(state.codec.encoded_len(), 64);
        assert!(state.policies.get(RouteClass::Api).rate_limit.is_some());
    }

    #[test]
    fn test_rate_limiting_disabled() {
        let mut config = GateConfig::default();
        config.rate_limit.enabled = false;
        let state = GateState::from_config(&config).unwrap();
        for class in RouteClass::ALL {
            assert!(state.policies.get(class).rate_limit.is_none());
        }
    }

    #[test]
    fn test_bad_header_name_is_config_error() {
        let mut config = GateConfig::default();
        config.csrf.header_name = "not a header".into();
        assert!(matches!(
            GateState::from_config(&config),
            Err(ConfigError::Invalid(_))
        ));
    }
}
