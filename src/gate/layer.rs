//! The gate as a tower middleware.

use std::net::SocketAddr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, request, HeaderMap, HeaderValue, Method, Request};
use axum::response::{IntoResponse, Response};
use cookie::Cookie;
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use crate::csrf::form::{FormFields, FormKind, FormRequest};
use crate::csrf::{CsrfToken, RequestView};
use crate::error::GateRejection;
use crate::gate::GateState;
use crate::observability::metrics;
use crate::policy::{CsrfMode, Policy, RouteClass, TokenRefresh};
use crate::security::rate_limit::{client_key, RateLimitDecision};

/// Layer wrapping services in a [`RequestGate`].
#[derive(Clone)]
pub struct RequestGateLayer {
    state: Arc<GateState>,
}

impl RequestGateLayer {
    pub fn new(state: Arc<GateState>) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for RequestGateLayer {
    type Service = RequestGate<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestGate {
            inner,
            state: self.state.clone(),
        }
    }
}

/// Classifies, checks and finalizes every request before and after the
/// wrapped service.
#[derive(Clone)]
pub struct RequestGate<S> {
    inner: S,
    state: Arc<GateState>,
}

impl<S> Service<Request<Body>> for RequestGate<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Take the service that was driven to readiness, leave a clone behind.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let state = self.state.clone();
        Box::pin(gate(state, inner, req))
    }
}

/// The token reference a request carries, per CSRF mode.
enum Incoming {
    /// Double-submit: the well-formed CSRF cookie, if any.
    Cookie(Option<CsrfToken>),
    /// Session mode: the session id, if any.
    Session(Option<String>),
}

impl Incoming {
    fn read<R: RequestView + ?Sized>(state: &GateState, mode: CsrfMode, req: &R) -> Self {
        match mode {
            CsrfMode::DoubleSubmit => Self::Cookie(state.store.read_from_cookie(req)),
            CsrfMode::Session => Self::Session(state.sessions.session_id(req)),
        }
    }

    fn is_present(&self) -> bool {
        match self {
            Self::Cookie(token) => token.is_some(),
            Self::Session(id) => id.is_some(),
        }
    }
}

/// Methods that never change state and therefore skip the token check.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

async fn gate<S>(state: Arc<GateState>, mut inner: S, req: Request<Body>) -> Result<Response, S::Error>
where
    S: Service<Request<Body>, Response = Response>,
{
    let start = Instant::now();
    let safe = is_safe_method(req.method());
    let class = state.classifier.classify_request(req.uri().path(), safe);
    let policy = state.policies.get(class).clone();

    if class == RouteClass::Bypass {
        metrics::record_request(class, "bypass");
        return inner.call(req).await;
    }

    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_owned();

    let incoming = Incoming::read(&state, policy.csrf_mode, &req);

    let (req, validated) = if policy.csrf && !safe {
        match check_token(&state, &policy, &incoming, req).await {
            Ok((req, token)) => (req, Some(token)),
            Err(rejection) => return Ok(reject(class, &method, &path, &request_id, rejection)),
        }
    } else {
        (req, None)
    };

    let mut quota = None;
    if let Some(rule) = &policy.rate_limit {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let key = client_key(req.headers(), peer, state.trust_forwarded);
        match state.limiter.check(&key, class, rule) {
            RateLimitDecision::Allowed { limit, remaining } => quota = Some((limit, remaining)),
            RateLimitDecision::Limited { limit, retry_after } => {
                let rejection = GateRejection::RateLimited { retry_after, limit };
                return Ok(reject(class, &method, &path, &request_id, rejection));
            }
        }
    }

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        class = %class,
        "Request passed gate"
    );

    let mut response = inner.call(req).await?;

    if let Some((limit, remaining)) = quota {
        let headers = response.headers_mut();
        headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
    }

    finalize(&state, policy.token_refresh, incoming, validated, &mut response);

    metrics::record_request(class, "allowed");
    metrics::record_duration(class, start);
    Ok(response)
}

/// Validate the submitted token, handing the request back intact.
async fn check_token(
    state: &GateState,
    policy: &Policy,
    incoming: &Incoming,
    req: Request<Body>,
) -> Result<(Request<Body>, CsrfToken), GateRejection> {
    let store = &state.store;
    let (parts, body) = req.into_parts();

    // Nothing in the body can rescue a request without a reference token.
    if !incoming.is_present() || store.has_header_submission(&parts) {
        let token = verify(state, incoming, &parts)?;
        return Ok((Request::from_parts(parts, body), token));
    }

    let Some(kind) = FormKind::detect(&parts.headers) else {
        let token = verify(state, incoming, &parts)?;
        return Ok((Request::from_parts(parts, body), token));
    };

    let limit = policy.max_body_bytes;
    if declared_length(&parts).is_some_and(|len| len > limit) {
        return Err(GateRejection::PayloadTooLarge { limit });
    }

    let bytes = to_bytes(body, limit).await.map_err(|error| {
        tracing::debug!(%error, limit, "Failed to buffer form body");
        GateRejection::PayloadTooLarge { limit }
    })?;

    let fields = match parts.headers.get(header::CONTENT_TYPE) {
        Some(content_type) => {
            FormFields::parse(kind, content_type, bytes.clone(), store.field_name()).await
        }
        None => FormFields::default(),
    };

    let token = verify(state, incoming, &FormRequest::new(&parts, Some(&fields)))?;
    Ok((Request::from_parts(parts, Body::from(bytes)), token))
}

fn verify<R: RequestView + ?Sized>(
    state: &GateState,
    incoming: &Incoming,
    req: &R,
) -> Result<CsrfToken, GateRejection> {
    match incoming {
        Incoming::Cookie(_) => state.store.validate(req),
        Incoming::Session(id) => state
            .sessions
            .verify(id.as_deref(), state.store.read_from_submission(req)),
    }
}

fn declared_length(parts: &request::Parts) -> Option<usize> {
    parts
        .headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn reject(
    class: RouteClass,
    method: &Method,
    path: &str,
    request_id: &str,
    rejection: GateRejection,
) -> Response {
    tracing::warn!(
        request_id = %request_id,
        method = %method,
        path = %path,
        class = %class,
        reason = rejection.reason(),
        error = %rejection,
        "Request rejected"
    );
    metrics::record_request(class, "rejected");
    metrics::record_rejection(rejection.reason());
    rejection.into_response()
}

/// Attach, refresh or rotate the token on the way out.
fn finalize(
    state: &GateState,
    refresh: TokenRefresh,
    incoming: Incoming,
    validated: Option<CsrfToken>,
    response: &mut Response,
) {
    match incoming {
        Incoming::Cookie(cookie) => finalize_cookie(state, refresh, cookie, validated, response),
        Incoming::Session(Some(id)) => {
            finalize_session(state, refresh, &id, validated, response)
        }
        // Without a session there is nothing to bind a token to.
        Incoming::Session(None) => {}
    }
}

fn finalize_cookie(
    state: &GateState,
    refresh: TokenRefresh,
    incoming: Option<CsrfToken>,
    validated: Option<CsrfToken>,
    response: &mut Response,
) {
    // The downstream (e.g. the issuance endpoint) already decided.
    if sets_cookie(response.headers(), state.store.cookie_name()) {
        return;
    }

    let (token, reason) = match (refresh, incoming) {
        (TokenRefresh::Rotate, _) if validated.is_some() => (state.codec.generate(), "rotate"),
        (TokenRefresh::Keep, Some(_)) => return,
        (TokenRefresh::Extend | TokenRefresh::Rotate, Some(token)) => (token, "extend"),
        (_, None) => (state.codec.generate(), "missing"),
    };

    if reason != "extend" {
        metrics::record_token_issued(reason);
    }
    state.store.attach(response, &token);
}

fn finalize_session(
    state: &GateState,
    refresh: TokenRefresh,
    session_id: &str,
    validated: Option<CsrfToken>,
    response: &mut Response,
) {
    let rotate = refresh == TokenRefresh::Rotate && validated.is_some();
    if !rotate && state.sessions.current(session_id).is_some() {
        if refresh == TokenRefresh::Extend {
            state.sessions.touch(session_id);
        }
        return;
    }

    let token = state.sessions.issue(&state.codec, session_id);
    metrics::record_token_issued(if rotate { "rotate" } else { "missing" });
    state.store.attach_header(response, &token);
}

fn sets_cookie(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse(value).ok())
        .any(|cookie| cookie.name() == name)
}
