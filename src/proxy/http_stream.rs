//! Media relay (`/x`)
//!
//! Forwards playlist and segment requests to an upstream origin:
//!   - One upstream GET per call, with the fixed browser header set and the
//!     inbound `Range` forwarded verbatim.
//!   - No total timeout; live streams stay open as long as the client reads.
//!   - Upstream status and headers are mirrored (minus hop-by-hop headers)
//!     before the first body byte, and the body is streamed, never buffered.
//!   - Playlists whose origin sent no content type are labelled as HLS.
//!
//! Failures before upstream headers arrive become
//! [`AppError::UpstreamUnavailable`]; after that an interrupted body simply
//! ends the response.

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Response, header};
use bytes::Bytes;
use futures::{Stream, StreamExt, future};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::RelayConfig;
use crate::errors::{AppError, AppResult, UpstreamKind};
use crate::proxy::headers::{PLAYLIST_CONTENT_TYPE, apply_cors_headers, copy_upstream_headers};
use crate::proxy::playlist_rewrite::{rewrite_playlist_response, should_rewrite};
use crate::utils::UpstreamClient;
use crate::utils::url::UrlUtils;

/// A validated media relay request
#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub target_url: Url,
    pub range: Option<HeaderValue>,
}

impl RelayRequest {
    /// Validate the `url` query parameter and capture the inbound `Range`
    pub fn new(url: Option<&str>, range: Option<&HeaderValue>) -> AppResult<Self> {
        let url = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AppError::invalid_request("Missing url"))?;
        let target_url =
            UrlUtils::parse_relay_target(url).ok_or_else(|| AppError::invalid_request("Invalid url"))?;

        Ok(Self {
            target_url,
            range: range.cloned(),
        })
    }

    /// Relay request for a provider live stream (`/xplay`)
    pub fn live_stream(stream: &LiveStreamParams, range: Option<&HeaderValue>) -> AppResult<Self> {
        let url = stream.upstream_url()?;
        Self::new(Some(&url), range)
    }

    /// Capture the relevant parts of the inbound request headers
    pub fn from_headers(url: Option<&str>, headers: &HeaderMap) -> AppResult<Self> {
        Self::new(url, headers.get(header::RANGE))
    }
}

/// Default container of provider live streams
pub const DEFAULT_LIVE_STREAM_TYPE: &str = "m3u8";

/// Parameters identifying a live stream on a provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveStreamParams {
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub stream_id: Option<String>,
    pub kind: Option<String>,
}

impl LiveStreamParams {
    /// `http://{host}/live/{username}/{password}/{stream_id}.{kind}`
    pub fn upstream_url(&self) -> AppResult<String> {
        let host = required(&self.host, "Missing host")?;
        let username = required(&self.username, "Missing u")?;
        let password = required(&self.password, "Missing p")?;
        let stream_id = required(&self.stream_id, "Missing stream")?;
        let kind = self
            .kind
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .unwrap_or(DEFAULT_LIVE_STREAM_TYPE);
        if !kind.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::invalid_request("Invalid type"));
        }

        Ok(format!(
            "{}/live/{}/{}/{}.{}",
            UrlUtils::provider_base_url(host),
            urlencoding::encode(username),
            urlencoding::encode(password),
            urlencoding::encode(stream_id),
            kind
        ))
    }
}

fn required<'a>(value: &'a Option<String>, missing: &'static str) -> AppResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::invalid_request(missing))
}

/// Relay a media request and stream the upstream body back
pub async fn relay_stream(
    client: &UpstreamClient,
    request: RelayRequest,
    relay: &RelayConfig,
) -> AppResult<Response<Body>> {
    let target = request.target_url.as_str();
    let safe_url = UrlUtils::obfuscate_credentials(target);
    debug!("Relaying upstream media: {}", safe_url);

    let mut upstream_request = client.get(target);
    if let Some(range) = &request.range {
        upstream_request = upstream_request.header(header::RANGE, range.clone());
    }

    let upstream = upstream_request.send().await.map_err(|e| {
        AppError::upstream_unavailable(
            UpstreamKind::Relay,
            &safe_url,
            UrlUtils::obfuscate_credentials(&e.to_string()),
        )
    })?;

    let status = upstream.status();
    let mut headers = copy_upstream_headers(upstream.headers());
    if !headers.contains_key(header::CONTENT_TYPE) && UrlUtils::is_playlist_path(target) {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PLAYLIST_CONTENT_TYPE),
        );
    }
    apply_cors_headers(&mut headers);

    debug!(
        "Upstream answered {} for {} (ct={:?}, cl={:?})",
        status,
        safe_url,
        headers.get(header::CONTENT_TYPE),
        headers.get(header::CONTENT_LENGTH)
    );
    if !status.is_success() {
        warn!("Upstream returned {} for {}", status, safe_url);
    }

    if relay.rewrite_playlists && should_rewrite(status, &headers, target) {
        return rewrite_playlist_response(
            upstream,
            status,
            headers,
            target,
            relay.max_playlist_bytes,
        )
        .await;
    }

    let mut response = Response::new(relay_body(upstream.bytes_stream(), safe_url.clone()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;

    info!("Relay established ({}) for {}", status, safe_url);
    Ok(response)
}

/// Stream upstream chunks to the client; the first upstream error ends the body
pub(crate) fn relay_body<S>(upstream: S, safe_url: String) -> Body
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let chunks = upstream.scan(safe_url, |safe_url, chunk| {
        future::ready(match chunk {
            Ok(bytes) => Some(Ok::<Bytes, Infallible>(bytes)),
            Err(e) => {
                warn!(
                    "Upstream body interrupted for {}: {}",
                    safe_url,
                    UrlUtils::obfuscate_credentials(&e.to_string())
                );
                None
            }
        })
    });
    Body::from_stream(chunks)
}
