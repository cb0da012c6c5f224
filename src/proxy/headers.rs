//! Response header handling shared by every relay surface.

use axum::http::{HeaderMap, HeaderName, HeaderValue, header};

/// Content type forced on `.m3u8` targets whose origin sent none
pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl; charset=utf-8";

/// Content type of every catalog response
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Content type of the short error and liveness bodies
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Methods advertised to browsers on every response
pub const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

// Connection-scoped headers; the relay re-frames the body so none of them
// describe the response it actually sends.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Whether a header only applies to a single transport hop
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// Copy upstream response headers, dropping hop-by-hop ones
///
/// Headers named by the upstream `Connection` header are dropped as well.
pub fn copy_upstream_headers(upstream: &HeaderMap) -> HeaderMap {
    let connection_scoped: Vec<String> = upstream
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    let mut headers = HeaderMap::with_capacity(upstream.len() + 4);
    for (name, value) in upstream {
        if is_hop_by_hop(name) || connection_scoped.iter().any(|t| t == name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Apply the permissive CORS header set
///
/// Overwrites any CORS headers the origin sent so browsers always see the
/// relay's policy.
pub fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("*"),
    );
    headers.remove(header::ACCESS_CONTROL_ALLOW_CREDENTIALS);
}
