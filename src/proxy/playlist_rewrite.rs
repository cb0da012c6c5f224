//! Optional playlist rewriting
//!
//! When `relay.rewrite_playlists` is on, playlists served through `/x` have
//! every URI absolutized against the playlist URL and pointed back through
//! the relay, so variant, segment and key requests also pass through it.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Response, StatusCode, header};
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, stream};
use tracing::{debug, info};

use crate::errors::{AppError, AppResult, UpstreamKind};
use crate::playback::manifest::rewrite_uris;
use crate::proxy::http_stream::relay_body;
use crate::utils::url::UrlUtils;

/// Path of the media relay endpoint
pub const RELAY_PATH: &str = "/x";

// Upstream validators and range support describe the original body only
const STALE_AFTER_REWRITE: [header::HeaderName; 3] =
    [header::ETAG, header::LAST_MODIFIED, header::ACCEPT_RANGES];

/// Whether a relayed response is a candidate for rewriting
///
/// Only complete (200), non-encoded playlist bodies qualify; partial and
/// compressed bodies are passed through untouched.
pub fn should_rewrite(status: StatusCode, headers: &HeaderMap, target_url: &str) -> bool {
    if status != StatusCode::OK || headers.contains_key(header::CONTENT_ENCODING) {
        return false;
    }
    let is_playlist_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("mpegurl"));
    is_playlist_type || UrlUtils::is_playlist_path(target_url)
}

/// Relay URL for an absolute upstream URL
pub fn relay_url(absolute_url: &str) -> String {
    format!("{RELAY_PATH}?url={}", urlencoding::encode(absolute_url))
}

/// Rewrite a playlist body so every URI goes through the relay
pub fn rewrite_playlist(text: &str, playlist_url: &str) -> String {
    rewrite_uris(text, |uri| {
        let absolute = UrlUtils::absolutize(playlist_url, uri);
        relay_url(&absolute)
    })
}

/// Buffer a playlist response (bounded) and serve it rewritten
///
/// A body larger than `max_bytes` is relayed unchanged: the buffered prefix
/// is replayed ahead of the rest of the upstream stream.
pub async fn rewrite_playlist_response(
    upstream: reqwest::Response,
    status: StatusCode,
    mut headers: HeaderMap,
    target_url: &str,
    max_bytes: usize,
) -> AppResult<Response<Body>> {
    let safe_url = UrlUtils::obfuscate_credentials(target_url);

    let declared_len = upstream.content_length();
    let mut body = upstream.bytes_stream();
    let mut buffered =
        BytesMut::with_capacity(declared_len.map_or(8192, |l| l as usize).min(max_bytes));

    let oversized = declared_len.is_some_and(|len| len as usize > max_bytes);
    if !oversized {
        loop {
            match body.next().await {
                Some(Ok(chunk)) => {
                    buffered.extend_from_slice(&chunk);
                    if buffered.len() > max_bytes {
                        break;
                    }
                }
                Some(Err(e)) => {
                    return Err(AppError::upstream_unavailable(
                        UpstreamKind::Relay,
                        &safe_url,
                        UrlUtils::obfuscate_credentials(&e.to_string()),
                    ));
                }
                None => {
                    let text = String::from_utf8_lossy(&buffered);
                    let rewritten = rewrite_playlist(&text, target_url);
                    for name in STALE_AFTER_REWRITE {
                        headers.remove(name);
                    }
                    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));
                    headers.insert("x-playlist-rewritten", HeaderValue::from_static("relay"));
                    info!("Served rewritten playlist for {}", safe_url);
                    return Ok(build_response(status, headers, Body::from(rewritten)));
                }
            }
        }
    }

    debug!(
        "Playlist exceeds {} bytes, relaying unchanged: {}",
        max_bytes, safe_url
    );
    let prefix = stream::once(async move { Ok::<Bytes, reqwest::Error>(buffered.freeze()) });
    Ok(build_response(
        status,
        headers,
        relay_body(prefix.chain(body), safe_url),
    ))
}

fn build_response(status: StatusCode, headers: HeaderMap, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
