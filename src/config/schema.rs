//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::policy::{CsrfMode, RouteClass, TokenRefresh};

/// Root configuration for the request gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Deployment environment; drives cookie and header defaults.
    pub environment: Environment,

    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Token and cookie settings.
    pub csrf: CsrfConfig,

    /// Per-class policy overrides on top of the built-in defaults.
    pub policies: PoliciesConfig,

    /// Ordered route classification rules. Empty means the built-in table.
    pub routes: Vec<RouteRuleConfig>,

    /// Rate limiter settings shared by all classes.
    pub rate_limit: RateLimitConfig,

    /// Response security headers.
    pub security: SecurityConfig,

    /// Session collaborator settings.
    pub session: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl GateConfig {
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Whether the CSRF cookie carries the `Secure` attribute.
    pub fn cookie_secure(&self) -> bool {
        self.csrf.secure.unwrap_or(self.is_production())
    }

    /// Header profile, defaulting to strict in production.
    pub fn header_profile(&self) -> HeaderProfile {
        self.security.headers.unwrap_or(if self.is_production() {
            HeaderProfile::Strict
        } else {
            HeaderProfile::Development
        })
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment: {}", other)),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Outer request timeout in seconds, covering the downstream handler.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// CSRF token and cookie settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Cookie carrying the token.
    pub cookie_name: String,

    /// Request header the client echoes the token in (also set on responses).
    pub header_name: String,

    /// Form / multipart field the client may echo the token in instead.
    pub field_name: String,

    /// Bytes of entropy per token.
    pub token_bytes: usize,

    /// Cookie lifetime in seconds.
    pub max_age_secs: u64,

    /// Force the `Secure` attribute on or off. Unset follows the environment.
    pub secure: Option<bool>,

    /// Path of the token issuance endpoint.
    pub issue_path: String,

    /// Lifetime of a session-bound token, in seconds.
    pub session_ttl_secs: u64,

    /// Most sessions holding a server-side token at once.
    pub session_capacity: usize,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: "csrf-token".to_string(),
            header_name: "x-csrf-token".to_string(),
            field_name: "csrfToken".to_string(),
            token_bytes: 32,
            max_age_secs: 3600,
            secure: None,
            issue_path: "/api/csrf-token".to_string(),
            session_ttl_secs: 3600,
            session_capacity: 10_000,
        }
    }
}

/// Policy overrides, one table per route class.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PoliciesConfig {
    pub public: PolicyOverride,
    pub auth: PolicyOverride,
    pub api: PolicyOverride,
    pub upload: PolicyOverride,
    pub default: PolicyOverride,
}

impl PoliciesConfig {
    pub fn for_class(&self, class: RouteClass) -> Option<&PolicyOverride> {
        match class {
            RouteClass::Bypass => None,
            RouteClass::Public => Some(&self.public),
            RouteClass::Auth => Some(&self.auth),
            RouteClass::Api => Some(&self.api),
            RouteClass::Upload => Some(&self.upload),
            RouteClass::Default => Some(&self.default),
        }
    }
}

/// Fields left unset keep the class's built-in default.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PolicyOverride {
    /// Require a token on state-changing methods.
    pub csrf: Option<bool>,

    /// Check the token against the cookie or against the session's copy.
    pub csrf_mode: Option<CsrfMode>,

    /// Cookie refresh behaviour on the way out.
    pub token_refresh: Option<TokenRefresh>,

    /// Apply the rate limiter to this class.
    pub rate_limit_enabled: Option<bool>,

    /// Requests allowed per window.
    pub max_requests: Option<u32>,

    /// Window length in seconds.
    pub window_secs: Option<u64>,

    /// Largest form body buffered to look for the token field.
    pub max_body_bytes: Option<usize>,
}

/// One route classification rule. Exactly one matcher field must be set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteRuleConfig {
    /// Class assigned when the rule matches.
    pub class: RouteClass,

    /// Exact path match.
    #[serde(default)]
    pub exact: Option<String>,

    /// Path prefix match (case-sensitive).
    #[serde(default)]
    pub prefix: Option<String>,

    /// Segment pattern, `*` for one segment, trailing `**` for the rest.
    #[serde(default)]
    pub pattern: Option<String>,

    /// File extensions (without the dot).
    #[serde(default)]
    pub extensions: Vec<String>,
}

/// Rate limiter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Master switch. When off, no class is rate limited.
    pub enabled: bool,

    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    /// Only safe behind a proxy that overwrites these headers.
    pub trust_forwarded_headers: bool,

    /// Interval between sweeps of idle buckets, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trust_forwarded_headers: false,
            sweep_interval_secs: 60,
        }
    }
}

/// Security header profile.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HeaderProfile {
    Strict,
    Development,
    Off,
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// Header profile. Unset follows the environment.
    pub headers: Option<HeaderProfile>,
}

/// Session collaborator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie owned by the auth platform. Its value is never rewritten; it
    /// only keys session-bound tokens.
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
