//! Form field extraction for token submission.
//!
//! # Responsibilities
//! - Recognise urlencoded and multipart form bodies
//! - Pull the submitted token field out of an already-buffered body
//! - Expose parsed fields through [`RequestView::form_field`]
//!
//! # Design Decisions
//! - Bodies are buffered by the gate (bounded per route class) and handed
//!   back to the downstream handler untouched; this module never consumes
//!   the only copy
//! - Multipart parsing stops at the first matching text field; file parts
//!   are skipped without being read into memory twice

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart};
use axum::http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use axum::http::{request, Request};
use tower::{service_fn, Layer, ServiceExt};

use crate::csrf::exchange::{cookie_from_headers, RequestView};

/// Body encodings that can carry a token field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    UrlEncoded,
    Multipart,
}

impl FormKind {
    /// Detect the form encoding from the request's `Content-Type`.
    pub fn detect(headers: &HeaderMap) -> Option<Self> {
        let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "application/x-www-form-urlencoded" => Some(Self::UrlEncoded),
            "multipart/form-data" => Some(Self::Multipart),
            _ => None,
        }
    }
}

/// Text fields parsed out of a form body.
#[derive(Debug, Default, Clone)]
pub struct FormFields {
    fields: Vec<(String, String)>,
}

impl FormFields {
    /// Parse `body` according to `kind`, keeping only the field named `wanted`.
    ///
    /// Malformed bodies yield no fields; the caller then treats the token as
    /// absent.
    pub async fn parse(
        kind: FormKind,
        content_type: &HeaderValue,
        body: Bytes,
        wanted: &str,
    ) -> Self {
        let fields = match kind {
            FormKind::UrlEncoded => Self::parse_urlencoded(&body, wanted),
            FormKind::Multipart => Self::parse_multipart(content_type, body, wanted).await,
        };
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn parse_urlencoded(body: &[u8], wanted: &str) -> Vec<(String, String)> {
        match serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
            Ok(pairs) => pairs.into_iter().filter(|(key, _)| key == wanted).take(1).collect(),
            Err(error) => {
                tracing::debug!(%error, "Failed to decode urlencoded form body");
                Vec::new()
            }
        }
    }

    async fn parse_multipart(
        content_type: &HeaderValue,
        body: Bytes,
        wanted: &str,
    ) -> Vec<(String, String)> {
        let req = match Request::builder()
            .header(CONTENT_TYPE, content_type.clone())
            .body(Body::from(body))
        {
            Ok(req) => req,
            Err(error) => {
                tracing::debug!(%error, "Failed to rebuild multipart request");
                return Vec::new();
            }
        };

        // The buffer is already bounded by the caller; lift axum's default
        // body limit so large uploads can still be searched.
        let wanted = wanted.to_owned();
        let extract = DefaultBodyLimit::disable().layer(service_fn(move |req: Request<Body>| {
            let wanted = wanted.clone();
            async move { Ok::<_, Infallible>(read_multipart(req, &wanted).await) }
        }));
        match extract.oneshot(req).await {
            Ok(fields) => fields,
            Err(never) => match never {},
        }
    }
}

async fn read_multipart(req: Request<Body>, wanted: &str) -> Vec<(String, String)> {
    let mut multipart = match Multipart::from_request(req, &()).await {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::debug!(%rejection, "Rejected multipart body");
            return Vec::new();
        }
    };

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some(wanted) || field.file_name().is_some() {
                    continue;
                }
                return match field.text().await {
                    Ok(value) => vec![(wanted.to_owned(), value)],
                    Err(error) => {
                        tracing::debug!(%error, "Failed to read multipart token field");
                        Vec::new()
                    }
                };
            }
            Ok(None) => return Vec::new(),
            Err(error) => {
                tracing::debug!(%error, "Malformed multipart body");
                return Vec::new();
            }
        }
    }
}

/// Request parts paired with the form fields parsed from their body.
pub struct FormRequest<'a> {
    parts: &'a request::Parts,
    fields: Option<&'a FormFields>,
}

impl<'a> FormRequest<'a> {
    pub fn new(parts: &'a request::Parts, fields: Option<&'a FormFields>) -> Self {
        Self { parts, fields }
    }
}

impl RequestView for FormRequest<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn cookie(&self, name: &str) -> Option<String> {
        cookie_from_headers(&self.parts.headers, name)
    }

    fn form_field(&self, name: &str) -> Option<&str> {
        self.fields.and_then(|fields| fields.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_form_kind() {
        let mut headers = HeaderMap::new();
        assert_eq!(FormKind::detect(&headers), None);

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert_eq!(FormKind::detect(&headers), None);

        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=UTF-8"),
        );
        assert_eq!(FormKind::detect(&headers), Some(FormKind::UrlEncoded));

        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("Multipart/Form-Data; boundary=X"),
        );
        assert_eq!(FormKind::detect(&headers), Some(FormKind::Multipart));
    }

    #[tokio::test]
    async fn test_urlencoded_field() {
        let ct = HeaderValue::from_static("application/x-www-form-urlencoded");
        let body = Bytes::from_static(b"adress=Storgatan+1&csrfToken=abc123&pris=100");
        let fields = FormFields::parse(FormKind::UrlEncoded, &ct, body, "csrfToken").await;
        assert_eq!(fields.get("csrfToken"), Some("abc123"));
        assert_eq!(fields.get("adress"), None);
    }

    #[tokio::test]
    async fn test_multipart_field_after_file_part() {
        let ct = HeaderValue::from_static("multipart/form-data; boundary=XBOUNDARY");
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"image\"; filename=\"hus.png\"\r\n",
            "Content-Type: image/png\r\n\r\n",
            "PNGDATA\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"csrfToken\"\r\n\r\n",
            "deadbeef\r\n",
            "--XBOUNDARY--\r\n",
        );
        let fields =
            FormFields::parse(FormKind::Multipart, &ct, Bytes::from_static(body.as_bytes()), "csrfToken")
                .await;
        assert_eq!(fields.get("csrfToken"), Some("deadbeef"));
    }

    #[tokio::test]
    async fn test_malformed_bodies_yield_nothing() {
        let ct = HeaderValue::from_static("multipart/form-data; boundary=XBOUNDARY");
        let fields =
            FormFields::parse(FormKind::Multipart, &ct, Bytes::from_static(b"garbage"), "csrfToken").await;
        assert_eq!(fields.get("csrfToken"), None);

        let ct = HeaderValue::from_static("multipart/form-data");
        let fields =
            FormFields::parse(FormKind::Multipart, &ct, Bytes::from_static(b""), "csrfToken").await;
        assert_eq!(fields.get("csrfToken"), None);
    }
}
