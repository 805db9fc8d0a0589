//! Double-submit token transport.
//!
//! # Responsibilities
//! - Read the token from the CSRF cookie
//! - Read the client's echo from a header, falling back to a form field
//! - Attach a token to a response (cookie + header for script access)
//! - Evaluate the (cookie, submitted) pair
//!
//! # Design Decisions
//! - The cookie is deliberately not `HttpOnly`: client script must read it to
//!   echo it back
//! - `SameSite=Lax`, `Path=/`, `Secure` controlled by the environment
//! - Absent and mismatched tokens are distinct internally but map to the same
//!   external rejection

use axum::http::header::{HeaderName, HeaderValue};
use cookie::{time, Cookie, SameSite};

use crate::config::CsrfConfig;
use crate::csrf::exchange::{RequestView, ResponseSink};
use crate::csrf::token::{CsrfToken, TokenCodec};
use crate::error::{ConfigError, GateRejection};

/// The two sides of a double-submit check for one request.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub cookie: Option<CsrfToken>,
    pub submitted: Option<CsrfToken>,
}

impl TokenPair {
    /// Validate the pair, returning the agreed token on success.
    ///
    /// A missing side always fails closed.
    pub fn verify(self) -> Result<CsrfToken, GateRejection> {
        match (self.cookie, self.submitted) {
            (Some(cookie), Some(submitted)) => {
                if TokenCodec::equals(&cookie, &submitted) {
                    Ok(cookie)
                } else {
                    Err(GateRejection::TokenMismatch)
                }
            }
            (cookie, submitted) => Err(GateRejection::TokenAbsent {
                cookie: cookie.is_some(),
                submitted: submitted.is_some(),
            }),
        }
    }
}

/// Carries the CSRF token across the request/response boundary.
#[derive(Debug, Clone)]
pub struct DoubleSubmitStore {
    cookie_name: String,
    header_name: HeaderName,
    field_name: String,
    secure: bool,
    max_age_secs: u64,
    codec: TokenCodec,
}

impl DoubleSubmitStore {
    pub fn new(
        cookie_name: impl Into<String>,
        header_name: HeaderName,
        field_name: impl Into<String>,
        secure: bool,
        max_age_secs: u64,
    ) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            header_name,
            field_name: field_name.into(),
            secure,
            max_age_secs,
            codec: TokenCodec::default(),
        }
    }

    /// Accept only tokens of the shape `codec` generates.
    pub fn with_codec(mut self, codec: TokenCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Build the store from configuration.
    ///
    /// `secure` is resolved by the caller from the environment so that
    /// production can never emit a non-`Secure` cookie by omission.
    pub fn from_config(config: &CsrfConfig, secure: bool) -> Result<Self, ConfigError> {
        let header_name = HeaderName::from_bytes(config.header_name.as_bytes())
            .map_err(|e| ConfigError::Invalid(format!("csrf.header_name: {}", e)))?;
        Ok(Self::new(
            config.cookie_name.clone(),
            header_name,
            config.field_name.clone(),
            secure,
            config.max_age_secs,
        )
        .with_codec(TokenCodec::new(config.token_bytes)))
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn read_from_cookie<R: RequestView + ?Sized>(&self, req: &R) -> Option<CsrfToken> {
        req.cookie(&self.cookie_name)
            .and_then(|value| self.codec.parse(&value))
    }

    /// Header first, then the form field.
    pub fn read_from_submission<R: RequestView + ?Sized>(&self, req: &R) -> Option<CsrfToken> {
        self.read_from_header(req).or_else(|| {
            req.form_field(&self.field_name)
                .and_then(|value| self.codec.parse(value))
        })
    }

    /// Whether the request already carries a usable header submission, in
    /// which case the body never needs to be inspected.
    pub fn has_header_submission<R: RequestView + ?Sized>(&self, req: &R) -> bool {
        self.read_from_header(req).is_some()
    }

    fn read_from_header<R: RequestView + ?Sized>(&self, req: &R) -> Option<CsrfToken> {
        req.header(self.header_name.as_str())
            .and_then(|value| self.codec.parse(value))
    }

    /// Collect both sides of the double-submit pair.
    pub fn token_pair<R: RequestView + ?Sized>(&self, req: &R) -> TokenPair {
        TokenPair {
            cookie: self.read_from_cookie(req),
            submitted: self.read_from_submission(req),
        }
    }

    /// Validate the request's double-submit pair.
    pub fn validate<R: RequestView + ?Sized>(&self, req: &R) -> Result<CsrfToken, GateRejection> {
        self.token_pair(req).verify()
    }

    /// The `Set-Cookie` representation of `token`.
    pub fn cookie(&self, token: &CsrfToken) -> Cookie<'static> {
        let max_age = i64::try_from(self.max_age_secs).unwrap_or(i64::MAX);
        Cookie::build((self.cookie_name.clone(), token.as_str().to_owned()))
            .path("/")
            .same_site(SameSite::Lax)
            .http_only(false)
            .secure(self.secure)
            .max_age(time::Duration::seconds(max_age))
            .build()
    }

    /// Set the token cookie and mirror the value in the token header.
    pub fn attach<S: ResponseSink + ?Sized>(&self, res: &mut S, token: &CsrfToken) {
        res.set_cookie(&self.cookie(token));
        self.attach_header(res, token);
    }

    /// Expose the token in the token header only.
    pub fn attach_header<S: ResponseSink + ?Sized>(&self, res: &mut S, token: &CsrfToken) {
        match HeaderValue::from_str(token.as_str()) {
            Ok(value) => res.set_header(self.header_name.clone(), value),
            Err(error) => tracing::error!(%error, "Token is not a valid header value"),
        }
    }
}

impl Default for DoubleSubmitStore {
    fn default() -> Self {
        Self::new(
            "csrf-token",
            HeaderName::from_static("x-csrf-token"),
            "csrfToken",
            false,
            3600,
        )
    }
}
