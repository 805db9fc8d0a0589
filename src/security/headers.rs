//! Security response headers.
//!
//! # Responsibilities
//! - Build the header set for a profile (strict, development, off)
//! - Stamp it on every response leaving the server
//!
//! # Design Decisions
//! - Header values are validated once at construction, not per response
//! - Strict adds CSP and HSTS; development keeps framing same-origin and
//!   leaves CSP/HSTS off so local tooling keeps working

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::config::schema::HeaderProfile;

const STRICT_CSP: &str = "default-src 'self'; \
    script-src 'self' 'unsafe-inline' 'unsafe-eval'; \
    style-src 'self' 'unsafe-inline'; \
    img-src 'self' data: https: blob:; \
    font-src 'self'; \
    connect-src 'self'; \
    object-src 'none'; \
    frame-ancestors 'none'; \
    base-uri 'self'; \
    form-action 'self'; \
    upgrade-insecure-requests";

const HSTS: &str = "max-age=31536000; includeSubDomains; preload";

/// A fixed set of headers applied to every response.
#[derive(Debug, Clone, Default)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl SecurityHeaders {
    pub fn for_profile(profile: HeaderProfile) -> Self {
        match profile {
            HeaderProfile::Strict => Self::strict(),
            HeaderProfile::Development => Self::development(),
            HeaderProfile::Off => Self::default(),
        }
    }

    /// Production profile.
    pub fn strict() -> Self {
        Self::from_static(&[
            (header::CONTENT_SECURITY_POLICY, STRICT_CSP),
            (header::X_FRAME_OPTIONS, "DENY"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            (header::STRICT_TRANSPORT_SECURITY, HSTS),
            (header::X_XSS_PROTECTION, "1; mode=block"),
            (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
            (
                HeaderName::from_static("permissions-policy"),
                "camera=(), microphone=(), geolocation=()",
            ),
            (HeaderName::from_static("cross-origin-embedder-policy"), "require-corp"),
            (HeaderName::from_static("cross-origin-opener-policy"), "same-origin"),
            (HeaderName::from_static("cross-origin-resource-policy"), "same-origin"),
        ])
    }

    /// Local development profile: no CSP, no HSTS.
    pub fn development() -> Self {
        Self::from_static(&[
            (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            (header::X_XSS_PROTECTION, "1; mode=block"),
            (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
            (
                HeaderName::from_static("permissions-policy"),
                "camera=(), microphone=(), geolocation=()",
            ),
            (HeaderName::from_static("cross-origin-embedder-policy"), "unsafe-none"),
            (HeaderName::from_static("cross-origin-opener-policy"), "unsafe-none"),
            (HeaderName::from_static("cross-origin-resource-policy"), "cross-origin"),
        ])
    }

    fn from_static(pairs: &[(HeaderName, &'static str)]) -> Self {
        Self {
            headers: pairs
                .iter()
                .map(|(name, value)| (name.clone(), HeaderValue::from_static(value)))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in &self.headers {
            headers.insert(name.clone(), value.clone());
        }
    }
}

/// Axum middleware adding the configured headers to every response.
pub async fn security_headers_middleware(
    State(headers): State<Arc<SecurityHeaders>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    headers.apply(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_strict_profile() {
        let mut headers = HeaderMap::new();
        SecurityHeaders::strict().apply(&mut headers);
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert!(headers[header::STRICT_TRANSPORT_SECURITY]
            .to_str()
            .unwrap()
            .starts_with("max-age=31536000"));
        let csp = headers[header::CONTENT_SECURITY_POLICY].to_str().unwrap();
        assert!(csp.contains("frame-ancestors 'none'"));
        assert!(csp.contains("object-src 'none'"));
    }

    #[test]
    fn test_development_profile() {
        let mut headers = HeaderMap::new();
        SecurityHeaders::development().apply(&mut headers);
        assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert!(!headers.contains_key(header::CONTENT_SECURITY_POLICY));
        assert!(!headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
    }

    #[test]
    fn test_off_profile() {
        assert!(SecurityHeaders::for_profile(HeaderProfile::Off).is_empty());
    }

    #[tokio::test]
    async fn test_middleware_stamps_response() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(
                Arc::new(SecurityHeaders::strict()),
                security_headers_middleware,
            ));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
    }
}
