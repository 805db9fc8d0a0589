//! HTTP capability traits used by the CSRF store.
//!
//! The store only needs to read headers and cookies (and, for form posts,
//! already-parsed form fields) from a request, and to set headers and cookies
//! on a response. These traits keep it independent of any particular server
//! framework; implementations are provided for the `http` crate types that
//! axum, hyper and tower share.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{request, Request, Response};
use cookie::Cookie;

/// Read access to an inbound request.
pub trait RequestView {
    /// First value of the named header, if present and valid UTF-8.
    fn header(&self, name: &str) -> Option<&str>;

    /// Value of the named cookie from the `Cookie` header(s).
    fn cookie(&self, name: &str) -> Option<String>;

    /// Value of a submitted form field. Only available once the body has
    /// been parsed; plain requests have none.
    fn form_field(&self, _name: &str) -> Option<&str> {
        None
    }
}

/// Write access to an outbound response.
pub trait ResponseSink {
    fn set_header(&mut self, name: HeaderName, value: HeaderValue);

    /// Append a `Set-Cookie` header, keeping any cookies already set by
    /// downstream handlers.
    fn set_cookie(&mut self, cookie: &Cookie<'_>);
}

/// Find a cookie across every `Cookie` header in the map.
pub fn cookie_from_headers(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(|parsed| match parsed {
            Ok(cookie) => Some(cookie),
            Err(error) => {
                tracing::debug!(?error, "Failed to parse cookie");
                None
            }
        })
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_owned())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn append_set_cookie(headers: &mut HeaderMap, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(error) => {
            tracing::error!(%error, cookie = cookie.name(), "Refusing to emit invalid Set-Cookie header");
        }
    }
}

impl RequestView for HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        header_str(self, name)
    }

    fn cookie(&self, name: &str) -> Option<String> {
        cookie_from_headers(self, name)
    }
}

impl RequestView for request::Parts {
    fn header(&self, name: &str) -> Option<&str> {
        header_str(&self.headers, name)
    }

    fn cookie(&self, name: &str) -> Option<String> {
        cookie_from_headers(&self.headers, name)
    }
}

impl<B> RequestView for Request<B> {
    fn header(&self, name: &str) -> Option<&str> {
        header_str(self.headers(), name)
    }

    fn cookie(&self, name: &str) -> Option<String> {
        cookie_from_headers(self.headers(), name)
    }
}

impl ResponseSink for HeaderMap {
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.insert(name, value);
    }

    fn set_cookie(&mut self, cookie: &Cookie<'_>) {
        append_set_cookie(self, cookie);
    }
}

impl<B> ResponseSink for Response<B> {
    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers_mut().insert(name, value);
    }

    fn set_cookie(&mut self, cookie: &Cookie<'_>) {
        append_set_cookie(self.headers_mut(), cookie);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_cookie_lookup_across_headers() {
        let req = Request::builder()
            .header("cookie", "theme=dark; sb-auth-token=opaque")
            .header("cookie", "csrf-token=abc123")
            .body(Body::empty())
            .unwrap();

        assert_eq!(req.cookie("csrf-token").as_deref(), Some("abc123"));
        assert_eq!(req.cookie("theme").as_deref(), Some("dark"));
        assert!(req.cookie("missing").is_none());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = Request::builder()
            .header("X-CSRF-Token", "value")
            .body(Body::empty())
            .unwrap();
        assert_eq!(req.header("x-csrf-token"), Some("value"));
        assert!(req.form_field("csrfToken").is_none());
    }

    #[test]
    fn test_set_cookie_appends() {
        let mut res = Response::new(Body::empty());
        res.set_cookie(&Cookie::new("session", "keep"));
        res.set_cookie(&Cookie::new("csrf-token", "fresh"));

        let cookies: Vec<_> = res
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies, vec!["session=keep", "csrf-token=fresh"]);
    }
}
