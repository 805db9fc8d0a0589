//! Error types.
//!
//! Two families with very different lifetimes:
//! - [`ConfigError`]: fatal, raised while starting up. The process refuses to
//!   serve rather than run insecurely.
//! - [`GateRejection`]: per request, terminal for that request, never retried.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::config::validation::ValidationError;

/// Startup failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Secure random source unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("TLS material not found: {0}")]
    TlsMaterial(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reason a request was stopped at the gate.
#[derive(Debug, Error)]
pub enum GateRejection {
    /// One or both sides of the double-submit pair were missing.
    #[error("CSRF token absent (cookie present: {cookie}, submission present: {submitted})")]
    TokenAbsent { cookie: bool, submitted: bool },

    /// Both sides present but not equal.
    #[error("CSRF token mismatch")]
    TokenMismatch,

    #[error("Rate limit of {limit} requests exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration, limit: u32 },

    /// The form body that would carry the token exceeds the class ceiling.
    #[error("Form body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// A session-bound token was requested without a session.
    #[error("No session to bind a CSRF token to")]
    SessionRequired,
}

pub const CSRF_FAILED_CODE: &str = "CSRF_VALIDATION_FAILED";
pub const RATE_LIMITED_CODE: &str = "RATE_LIMITED";
pub const PAYLOAD_TOO_LARGE_CODE: &str = "PAYLOAD_TOO_LARGE";
pub const SESSION_REQUIRED_CODE: &str = "SESSION_REQUIRED";

impl GateRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::TokenAbsent { .. } | Self::TokenMismatch => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::SessionRequired => StatusCode::UNAUTHORIZED,
        }
    }

    /// Metric label. Distinguishes absent from mismatch server-side only.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::TokenAbsent { .. } => "csrf_absent",
            Self::TokenMismatch => "csrf_mismatch",
            Self::RateLimited { .. } => "rate_limited",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::SessionRequired => "session_required",
        }
    }

    /// Whole seconds a throttled client should wait, never zero.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after, .. } => {
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                Some(secs.max(1))
            }
            _ => None,
        }
    }
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = self.retry_after_secs().unwrap_or(1);
        match self {
            // Absent and mismatch share one body so the response is no oracle.
            Self::TokenAbsent { .. } | Self::TokenMismatch => (
                status,
                Json(json!({
                    "error": "Invalid CSRF token. Reload the page and try again.",
                    "code": CSRF_FAILED_CODE,
                })),
            )
                .into_response(),
            Self::RateLimited { limit, .. } => {
                let mut response = (
                    status,
                    Json(json!({
                        "error": "Too many requests, please try again later.",
                        "code": RATE_LIMITED_CODE,
                        "retryAfter": retry_after,
                    })),
                )
                    .into_response();
                let headers = response.headers_mut();
                headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
                headers.insert("x-ratelimit-remaining", HeaderValue::from(0_u32));
                response
            }
            Self::PayloadTooLarge { .. } => (
                status,
                Json(json!({
                    "error": "Request body too large.",
                    "code": PAYLOAD_TOO_LARGE_CODE,
                })),
            )
                .into_response(),
            Self::SessionRequired => (
                status,
                Json(json!({
                    "error": "Sign in to continue.",
                    "code": SESSION_REQUIRED_CODE,
                })),
            )
                .into_response(),
        }
    }
}
