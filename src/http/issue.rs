//! Token issuance endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::GateRejection;
use crate::gate::GateState;
use crate::observability::metrics;
use crate::policy::CsrfMode;

#[derive(Debug, Serialize)]
pub struct IssuedToken {
    pub token: String,
}

/// `GET` handler returning a fresh token in the body and the token header.
///
/// In double-submit mode the token also goes into the cookie. In session mode
/// it is stored against the caller's session instead, and a caller without a
/// session is refused.
pub async fn issue_token(
    State(state): State<Arc<GateState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let class = state.classifier.classify(uri.path());
    let mode = state.policies.get(class).csrf_mode;

    let token = match mode {
        CsrfMode::DoubleSubmit => state.codec.generate(),
        CsrfMode::Session => match state.sessions.session_id(&headers) {
            Some(id) => state.sessions.issue(&state.codec, &id),
            None => return GateRejection::SessionRequired.into_response(),
        },
    };
    let body = IssuedToken {
        token: token.as_str().to_owned(),
    };

    let mut response = ([(header::CACHE_CONTROL, "no-store")], Json(body)).into_response();
    match mode {
        CsrfMode::DoubleSubmit => state.store.attach(&mut response, &token),
        CsrfMode::Session => state.store.attach_header(&mut response, &token),
    }

    metrics::record_token_issued("endpoint");
    tracing::debug!(?mode, "Issued CSRF token");
    response
}
