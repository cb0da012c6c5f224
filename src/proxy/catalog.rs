//! Catalog relay (`/xtream`)
//!
//! Forwards provider catalog API calls (`player_api.php?action=...`) so a
//! browser can read category and stream listings despite CORS and
//! mixed-content rules. The JSON body is passed through as text.

use axum::body::Body;
use axum::http::{HeaderValue, Response, header};
use tracing::{debug, warn};
use url::Url;

use crate::config::CatalogConfig;
use crate::errors::{AppError, AppResult, UpstreamKind};
use crate::proxy::headers::{JSON_CONTENT_TYPE, apply_cors_headers};
use crate::utils::UpstreamClient;
use crate::utils::url::UrlUtils;

/// A catalog call as received from the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRequest {
    /// Provider `host[:port]`, optionally with a scheme
    pub host: String,
    /// Entry point on the provider, `None` for the configured default
    pub endpoint: Option<String>,
    /// Every other query parameter (`action`, credentials, ids), in request order
    pub params: Vec<(String, String)>,
}

impl CatalogRequest {
    /// Split the raw query pairs into host, endpoint and passthrough parameters
    pub fn from_query_pairs(pairs: Vec<(String, String)>) -> AppResult<Self> {
        let mut host = None;
        let mut endpoint = None;
        let mut params = Vec::with_capacity(pairs.len());

        for (key, value) in pairs {
            match key.as_str() {
                "host" if host.is_none() => host = Some(value),
                "endpoint" if endpoint.is_none() => endpoint = Some(value),
                _ => params.push((key, value)),
            }
        }

        let host = host
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AppError::invalid_request("Missing host"))?;
        let endpoint = endpoint
            .map(|e| e.trim().trim_start_matches('/').to_string())
            .filter(|e| !e.is_empty());

        Ok(Self {
            host,
            endpoint,
            params,
        })
    }

    /// `http://{host}/{endpoint}?{params...}`
    pub fn upstream_url(&self, default_endpoint: &str) -> AppResult<Url> {
        let endpoint = self
            .endpoint
            .as_deref()
            .unwrap_or_else(|| default_endpoint.trim_start_matches('/'));
        let base = UrlUtils::provider_base_url(&self.host);

        let mut url = Url::parse(&format!("{base}/{endpoint}"))
            .ok()
            .filter(|u| u.host_str().is_some())
            .ok_or_else(|| AppError::invalid_request("Invalid host"))?;

        if !self.params.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in &self.params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

/// Forward a catalog call and return the provider's body as JSON text
pub async fn fetch_catalog(
    client: &UpstreamClient,
    request: CatalogRequest,
    catalog: &CatalogConfig,
) -> AppResult<Response<Body>> {
    let url = request.upstream_url(&catalog.default_endpoint)?;
    let safe_url = UrlUtils::obfuscate_credentials(url.as_str());
    debug!("Catalog request: {}", safe_url);

    let upstream_error = |e: reqwest::Error| {
        AppError::upstream_unavailable(
            UpstreamKind::Catalog,
            &safe_url,
            UrlUtils::obfuscate_credentials(&e.to_string()),
        )
    };

    let upstream = client
        .get_with_timeout(url.as_str())
        .send()
        .await
        .map_err(upstream_error)?;
    let status = upstream.status();
    let body = upstream.text().await.map_err(upstream_error)?;

    if status.is_success() {
        debug!("Catalog response {} ({} bytes) for {}", status, body.len(), safe_url);
    } else {
        warn!("Catalog upstream returned {} for {}", status, safe_url);
    }

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_CONTENT_TYPE),
    );
    apply_cors_headers(headers);
    Ok(response)
}
