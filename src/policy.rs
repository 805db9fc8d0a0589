//! Route classes and their security policies.
//!
//! # Responsibilities
//! - Define the closed set of route classes
//! - Hold the static policy record for each class
//! - Merge configured overrides onto the built-in defaults
//!
//! # Design Decisions
//! - Built once at startup, read-only afterwards (shared via `Arc`)
//! - `Bypass` has a fixed, empty policy and cannot be overridden

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::schema::{PoliciesConfig, PolicyOverride};

/// Policy bucket assigned to each request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteClass {
    /// Static assets and health checks: exempt from every check.
    Bypass,
    /// Pages reachable without a session (login, public demos).
    Public,
    /// Authentication flows (callbacks, credential endpoints).
    Auth,
    /// JSON API.
    Api,
    /// Multipart uploads.
    Upload,
    /// Everything not matched by a rule.
    Default,
}

impl RouteClass {
    pub const ALL: [RouteClass; 6] = [
        RouteClass::Bypass,
        RouteClass::Public,
        RouteClass::Auth,
        RouteClass::Api,
        RouteClass::Upload,
        RouteClass::Default,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Bypass => "bypass",
            RouteClass::Public => "public",
            RouteClass::Auth => "auth",
            RouteClass::Api => "api",
            RouteClass::Upload => "upload",
            RouteClass::Default => "default",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to the token cookie on the way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenRefresh {
    /// Issue a cookie only if the request had none.
    Keep,
    /// Also re-set an existing cookie with a fresh `Max-Age`.
    Extend,
    /// Also replace the token after every successful validation.
    Rotate,
}

/// Where the reference copy of the token lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CsrfMode {
    /// In the CSRF cookie; the client echoes it back.
    #[default]
    DoubleSubmit,
    /// Server-side, keyed by the session cookie. No CSRF cookie is set.
    Session,
}

/// Requests allowed per window for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitRule {
    /// A zero `max_requests` rejects every request.
    pub const fn per_window(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

/// Checks applied to one route class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub csrf: bool,
    pub csrf_mode: CsrfMode,
    pub rate_limit: Option<RateLimitRule>,
    pub token_refresh: TokenRefresh,
    pub max_body_bytes: usize,
}

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;

impl Policy {
    /// Built-in policy for `class`.
    pub fn default_for(class: RouteClass) -> Self {
        match class {
            RouteClass::Bypass => Self {
                csrf: false,
                csrf_mode: CsrfMode::DoubleSubmit,
                rate_limit: None,
                token_refresh: TokenRefresh::Keep,
                max_body_bytes: 0,
            },
            RouteClass::Public => Self {
                csrf: false,
                csrf_mode: CsrfMode::DoubleSubmit,
                rate_limit: Some(RateLimitRule::per_window(60, 60)),
                token_refresh: TokenRefresh::Keep,
                max_body_bytes: MIB,
            },
            RouteClass::Auth => Self {
                csrf: true,
                csrf_mode: CsrfMode::DoubleSubmit,
                rate_limit: Some(RateLimitRule::per_window(10, 60)),
                token_refresh: TokenRefresh::Rotate,
                max_body_bytes: 64 * KIB,
            },
            RouteClass::Api | RouteClass::Default => Self {
                csrf: true,
                csrf_mode: CsrfMode::DoubleSubmit,
                rate_limit: Some(RateLimitRule::per_window(60, 60)),
                token_refresh: TokenRefresh::Extend,
                max_body_bytes: MIB,
            },
            RouteClass::Upload => Self {
                csrf: true,
                csrf_mode: CsrfMode::DoubleSubmit,
                rate_limit: Some(RateLimitRule::per_window(10, 60)),
                token_refresh: TokenRefresh::Extend,
                max_body_bytes: 25 * MIB,
            },
        }
    }

    fn with_override(mut self, o: &PolicyOverride) -> Self {
        if let Some(csrf) = o.csrf {
            self.csrf = csrf;
        }
        if let Some(mode) = o.csrf_mode {
            self.csrf_mode = mode;
        }
        if let Some(refresh) = o.token_refresh {
            self.token_refresh = refresh;
        }
        if let Some(bytes) = o.max_body_bytes {
            self.max_body_bytes = bytes;
        }

        let base = self.rate_limit.unwrap_or(RateLimitRule::per_window(60, 60));
        let rule = RateLimitRule {
            max_requests: o.max_requests.unwrap_or(base.max_requests),
            window: o.window_secs.map(Duration::from_secs).unwrap_or(base.window),
        };
        let enabled = o.rate_limit_enabled.unwrap_or(self.rate_limit.is_some());
        self.rate_limit = enabled.then_some(rule);
        self
    }
}

/// Immutable class → policy mapping.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: [Policy; 6],
}

impl PolicyTable {
    /// Built-in policies with no overrides.
    pub fn defaults() -> Self {
        Self {
            policies: RouteClass::ALL.map(Policy::default_for),
        }
    }

    /// Merge configured overrides. With `rate_limiting` off, no class keeps a
    /// rate-limit rule.
    pub fn from_config(config: &PoliciesConfig, rate_limiting: bool) -> Self {
        let policies = RouteClass::ALL.map(|class| {
            let base = Policy::default_for(class);
            let mut policy = match config.for_class(class) {
                Some(o) => base.with_override(o),
                None => base,
            };
            if !rate_limiting {
                policy.rate_limit = None;
            }
            policy
        });
        Self { policies }
    }

    pub fn get(&self, class: RouteClass) -> &Policy {
        &self.policies[class.index()]
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::defaults()
    }
}
