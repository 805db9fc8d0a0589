//! Session refresh hook.
//!
//! The session cookie belongs to the external auth platform. The hook runs
//! after the gate has let a request through and records whether a session
//! is present; it never reads or rewrites the cookie value.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::csrf::RequestView;

/// Session cookie settings.
#[derive(Debug, Clone)]
pub struct SessionHook {
    cookie_name: String,
}

/// Request extension set by the hook for downstream handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPresence(pub bool);

impl SessionHook {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
        }
    }
}

pub async fn session_refresh_middleware(
    State(hook): State<Arc<SessionHook>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let present = request.cookie(&hook.cookie_name).is_some();
    tracing::trace!(path = %request.uri().path(), present, "Session hook");
    request.extensions_mut().insert(SessionPresence(present));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::extract::Extension;
    use axum::http::header;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/",
                get(|Extension(SessionPresence(present)): Extension<SessionPresence>| async move {
                    present.to_string()
                }),
            )
            .layer(middleware::from_fn_with_state(
                Arc::new(SessionHook::new("sb-session")),
                session_refresh_middleware,
            ))
    }

    async fn body(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_session_presence() {
        let with = Request::get("/")
            .header(header::COOKIE, "sb-session=opaque")
            .body(Body::empty())
            .unwrap();
        assert_eq!(body(app().oneshot(with).await.unwrap()).await, "true");

        let without = Request::get("/").body(Body::empty()).unwrap();
        assert_eq!(body(app().oneshot(without).await.unwrap()).await, "false");
    }
}
