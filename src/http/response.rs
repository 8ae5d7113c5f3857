//! Response body transformation.
//!
//! # Responsibilities
//! - Buffer a forwarded response body completely
//! - Run it through a byte transform
//! - Replace the body and correct `Content-Length`
//!
//! # Design Decisions
//! - The transform is total: no error channel, unchanged input on no match
//! - Consumes the response, so a body is transformed at most once

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderValue, Method, Response, StatusCode},
};

/// Replace the body of `response` with `transform(body)`.
///
/// Errors reading the original body (including exceeding `limit`) are
/// returned unchanged.
pub async fn transform_body<F>(
    response: Response<Body>,
    limit: usize,
    transform: F,
) -> Result<Response<Body>, axum::Error>
where
    F: FnOnce(Bytes) -> Bytes,
{
    let (mut parts, body) = response.into_parts();
    let original = axum::body::to_bytes(body, limit).await?;
    let transformed = transform(original);

    parts.headers.remove(header::TRANSFER_ENCODING);
    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(transformed.len()));

    Ok(Response::from_parts(parts, Body::from(transformed)))
}

/// Whether a forwarded response carries a full, identity-encoded body that
/// a rewrite can safely operate on.
pub fn is_rewritable(method: &Method, response: &Response<Body>) -> bool {
    let status = response.status();
    *method != Method::HEAD
        && status.is_success()
        && status != StatusCode::NO_CONTENT
        && status != StatusCode::PARTIAL_CONTENT
        && !response.headers().contains_key(header::CONTENT_ENCODING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BodyEdit, RewriteRule};

    fn response(body: &'static str) -> Response<Body> {
        Response::builder()
            .header(header::CONTENT_LENGTH, body.len())
            .header(header::CONTENT_TYPE, "text/html")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_of(response: Response<Body>) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    fn content_length(response: &Response<Body>) -> usize {
        response.headers()[header::CONTENT_LENGTH]
            .to_str()
            .unwrap()
            .parse()
            .unwrap()
    }

    #[tokio::test]
    async fn content_length_tracks_growth_shrink_and_identity() {
        let grow = transform_body(response("abc"), 1024, |_| Bytes::from_static(b"abcdef"))
            .await
            .unwrap();
        assert_eq!(content_length(&grow), 6);

        let shrink = transform_body(response("abcdef"), 1024, |_| Bytes::from_static(b"a"))
            .await
            .unwrap();
        assert_eq!(content_length(&shrink), 1);

        let same = transform_body(response("abc"), 1024, |body| body).await.unwrap();
        assert_eq!(content_length(&same), 3);
        assert_eq!(body_of(same).await, Bytes::from_static(b"abc"));
    }

    #[tokio::test]
    async fn head_injection_scenario() {
        let rule = RewriteRule {
            path: "/".into(),
            edits: vec![BodyEdit::InjectBefore {
                marker: "</head>".into(),
                content: r#"<script src="/x.js"></script>"#.into(),
            }],
        };
        let out = transform_body(response("<html><head></head><body/></html>"), 1024, |body| {
            rule.apply(body)
        })
        .await
        .unwrap();

        let expected = r#"<html><head><script src="/x.js"></script></head><body/></html>"#;
        assert_eq!(content_length(&out), expected.len());
        assert_eq!(out.headers()[header::CONTENT_TYPE], "text/html");
        assert_eq!(body_of(out).await, Bytes::from(expected));
    }

    #[tokio::test]
    async fn read_failure_propagates() {
        let result = transform_body(response("too long for the limit"), 4, |body| body).await;
        assert!(result.is_err());
    }

    #[test]
    fn rewritable_responses() {
        assert!(is_rewritable(&Method::GET, &response("x")));
        assert!(!is_rewritable(&Method::HEAD, &response("x")));

        let mut gzipped = response("x");
        gzipped
            .headers_mut()
            .insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        assert!(!is_rewritable(&Method::GET, &gzipped));

        let mut not_modified = response("");
        *not_modified.status_mut() = StatusCode::NOT_MODIFIED;
        assert!(!is_rewritable(&Method::GET, &not_modified));
    }
}
