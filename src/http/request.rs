//! Request preparation for forwarding.
//!
//! # Responsibilities
//! - Point the request at the upstream origin
//! - Strip hop-by-hop headers
//! - Rewrite `Host`, append `X-Forwarded-For`, attach credentials
//!
//! # Design Decisions
//! - Original path and query are preserved verbatim
//! - Configured credentials replace any client `Authorization` header

use std::net::{IpAddr, SocketAddr};

use axum::http::{
    header::{self, HeaderName},
    request::Parts,
    HeaderMap, HeaderValue, Version,
};

use crate::http::upstream::Upstream;

/// Correlation header set by the request-id layer.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Headers that only apply to a single transport hop.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Append the client address to `X-Forwarded-For`.
pub fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let value = match headers
        .get("x-forwarded-for")
        .and_then(|existing| existing.to_str().ok())
    {
        Some(existing) => format!("{}, {}", existing, client),
        None => client.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert("x-forwarded-for", value);
    }
}

/// Rewrite request parts in place so they can be sent to the upstream.
///
/// With `identity_body` set, `Accept-Encoding` is dropped so the origin
/// answers with a body that can be rewritten byte for byte.
pub fn prepare_forward(
    parts: &mut Parts,
    upstream: &Upstream,
    client: SocketAddr,
    identity_body: bool,
) -> Result<(), axum::http::Error> {
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    parts.uri = upstream.http_uri(path_and_query)?;
    parts.version = Version::HTTP_11;

    strip_hop_by_hop(&mut parts.headers);

    if let Ok(host) = HeaderValue::from_str(upstream.authority().as_str()) {
        parts.headers.insert(header::HOST, host);
    }
    append_forwarded_for(&mut parts.headers, client.ip());

    if let Some(auth) = upstream.authorization() {
        parts.headers.insert(header::AUTHORIZATION, auth.clone());
    }
    if identity_body {
        parts.headers.remove(header::ACCEPT_ENCODING);
    }

    Ok(())
}
