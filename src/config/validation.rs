//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (lifetimes, entropy, windows)
//! - Check route rules are unambiguous
//! - Refuse insecure cookie settings in production
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderName;

use crate::config::schema::{GateConfig, PolicyOverride, RouteRuleConfig};
use crate::csrf::token::{MAX_TOKEN_BYTES, MIN_TOKEN_BYTES};
use crate::policy::RouteClass;

/// Longest cookie lifetime accepted, in seconds.
pub const MAX_COOKIE_AGE_SECS: u64 = 3600;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {:?}", config.listener.bind_address),
        ));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::new("listener.tls.key_path", "must not be empty"));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    validate_csrf(config, &mut errors);

    for class in RouteClass::ALL {
        if let Some(o) = config.policies.for_class(class) {
            validate_policy(class, o, &mut errors);
        }
    }

    for (i, rule) in config.routes.iter().enumerate() {
        validate_route(i, rule, &mut errors);
    }

    if config.rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.sweep_interval_secs",
            "must be greater than 0",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {:?}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_csrf(config: &GateConfig, errors: &mut Vec<ValidationError>) {
    let csrf = &config.csrf;

    if csrf.cookie_name.is_empty() {
        errors.push(ValidationError::new("csrf.cookie_name", "must not be empty"));
    } else if !csrf.cookie_name.bytes().all(is_cookie_name_byte) {
        errors.push(ValidationError::new(
            "csrf.cookie_name",
            "contains characters not allowed in a cookie name",
        ));
    }

    if HeaderName::from_bytes(csrf.header_name.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "csrf.header_name",
            format!("not a valid header name: {:?}", csrf.header_name),
        ));
    }

    if csrf.field_name.is_empty() {
        errors.push(ValidationError::new("csrf.field_name", "must not be empty"));
    }

    if csrf.token_bytes < MIN_TOKEN_BYTES {
        errors.push(ValidationError::new(
            "csrf.token_bytes",
            format!("must be at least {}", MIN_TOKEN_BYTES),
        ));
    } else if csrf.token_bytes > MAX_TOKEN_BYTES {
        errors.push(ValidationError::new(
            "csrf.token_bytes",
            format!("must be at most {}", MAX_TOKEN_BYTES),
        ));
    }

    if csrf.max_age_secs == 0 || csrf.max_age_secs > MAX_COOKIE_AGE_SECS {
        errors.push(ValidationError::new(
            "csrf.max_age_secs",
            format!("must be between 1 and {}", MAX_COOKIE_AGE_SECS),
        ));
    }

    if csrf.session_ttl_secs == 0 {
        errors.push(ValidationError::new("csrf.session_ttl_secs", "must be greater than 0"));
    }
    if csrf.session_capacity == 0 {
        errors.push(ValidationError::new("csrf.session_capacity", "must be greater than 0"));
    }

    if !csrf.issue_path.starts_with('/') {
        errors.push(ValidationError::new("csrf.issue_path", "must start with '/'"));
    }

    if config.is_production() && csrf.secure == Some(false) {
        errors.push(ValidationError::new(
            "csrf.secure",
            "cookies must be Secure in production",
        ));
    }
}

fn validate_policy(class: RouteClass, o: &PolicyOverride, errors: &mut Vec<ValidationError>) {
    if o.max_requests == Some(0) {
        errors.push(ValidationError::new(
            format!("policies.{}.max_requests", class),
            "must be greater than 0",
        ));
    }
    if o.window_secs == Some(0) {
        errors.push(ValidationError::new(
            format!("policies.{}.window_secs", class),
            "must be greater than 0",
        ));
    }
    if o.max_body_bytes == Some(0) {
        errors.push(ValidationError::new(
            format!("policies.{}.max_body_bytes", class),
            "must be greater than 0",
        ));
    }
}

fn validate_route(index: usize, rule: &RouteRuleConfig, errors: &mut Vec<ValidationError>) {
    let field = |name: &str| format!("routes[{}].{}", index, name);

    let set = [
        rule.exact.is_some(),
        rule.prefix.is_some(),
        rule.pattern.is_some(),
        !rule.extensions.is_empty(),
    ]
    .iter()
    .filter(|s| **s)
    .count();
    if set != 1 {
        errors.push(ValidationError::new(
            format!("routes[{}]", index),
            "exactly one of exact, prefix, pattern or extensions must be set",
        ));
    }

    for (name, path) in [
        ("exact", &rule.exact),
        ("prefix", &rule.prefix),
        ("pattern", &rule.pattern),
    ] {
        if let Some(path) = path {
            if !path.starts_with('/') {
                errors.push(ValidationError::new(field(name), "must start with '/'"));
            }
        }
    }

    if let Some(pattern) = &rule.pattern {
        let segments: Vec<_> = pattern.trim_start_matches('/').split('/').collect();
        if let Some(pos) = segments.iter().position(|s| *s == "**") {
            if pos + 1 != segments.len() {
                errors.push(ValidationError::new(field("pattern"), "'**' is only allowed last"));
            }
        }
    }

    for ext in &rule.extensions {
        if ext.is_empty() || ext.contains('/') || ext.starts_with('.') {
            errors.push(ValidationError::new(
                field("extensions"),
                format!("invalid extension {:?} (no dot, no slash)", ext),
            ));
        }
    }
}

// RFC 6265 token characters.
fn is_cookie_name_byte(b: u8) -> bool {
    b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{Environment, TlsConfig};

    fn fields(errors: &[ValidationError]) -> Vec<&str> {
        errors.iter().map(|e| e.field.as_str()).collect()
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&GateConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GateConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.request_secs = 0;
        config.csrf.cookie_name = "csrf;token".into();
        config.csrf.header_name = "bad header".into();
        config.csrf.token_bytes = 16;
        config.csrf.max_age_secs = 86_400;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            fields(&errors),
            vec![
                "listener.bind_address",
                "timeouts.request_secs",
                "csrf.cookie_name",
                "csrf.header_name",
                "csrf.token_bytes",
                "csrf.max_age_secs",
            ]
        );
    }

    #[test]
    fn test_production_requires_secure_cookie() {
        let mut config = GateConfig::default();
        config.environment = Environment::Production;
        config.csrf.secure = Some(false);
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(fields(&errors), vec!["csrf.secure"]);

        // Unset follows the environment and is therefore fine.
        config.csrf.secure = None;
        assert!(validate_config(&config).is_ok());
        assert!(config.cookie_secure());
    }

    #[test]
    fn test_route_rules() {
        let mut config = GateConfig::default();
        config.routes = vec![
            RouteRuleConfig {
                class: RouteClass::Public,
                exact: None,
                prefix: Some("/objekt".into()),
                pattern: None,
                extensions: vec![],
            },
            RouteRuleConfig {
                class: RouteClass::Api,
                exact: Some("/a".into()),
                prefix: Some("/b".into()),
                pattern: None,
                extensions: vec![],
            },
            RouteRuleConfig {
                class: RouteClass::Upload,
                exact: None,
                prefix: None,
                pattern: Some("api/**/images".into()),
                extensions: vec![],
            },
            RouteRuleConfig {
                class: RouteClass::Bypass,
                exact: None,
                prefix: None,
                pattern: None,
                extensions: vec![".png".into()],
            },
        ];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            fields(&errors),
            vec![
                "routes[1]",
                "routes[2].pattern",
                "routes[2].pattern",
                "routes[3].extensions",
            ]
        );
    }

    #[test]
    fn test_policy_and_tls_ranges() {
        let mut config = GateConfig::default();
        config.policies.upload.window_secs = Some(0);
        config.listener.tls = Some(TlsConfig {
            cert_path: String::new(),
            key_path: "key.pem".into(),
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            fields(&errors),
            vec!["listener.tls.cert_path", "policies.upload.window_secs"]
        );
    }
}
