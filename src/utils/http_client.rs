//! Upstream HTTP client
//!
//! Every call the relay makes on behalf of a browser goes through one pooled
//! `reqwest` client carrying a fixed browser-like header set. Panels and CDNs
//! that reject non-browser clients then see the same identity for catalog
//! calls, playlists and segments.
//!
//! Only a connect timeout is configured on the client itself: relayed live
//! streams must stay open indefinitely. Catalog calls add a per-request total
//! timeout through [`UpstreamClient::get_with_timeout`].

use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::errors::{AppError, AppResult};
use crate::utils::url::UrlUtils;

/// Shared, cheaply clonable client for upstream origins
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    request_timeout: Duration,
}

impl UpstreamClient {
    /// Build the client from the `[upstream]` configuration section
    pub fn from_config(config: &UpstreamConfig) -> AppResult<Self> {
        let headers = Self::browser_headers(config)?;

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build upstream client: {e}")))?;

        debug!(
            "Upstream client ready (connect timeout {}, catalog timeout {})",
            humantime::format_duration(config.connect_timeout),
            humantime::format_duration(config.request_timeout)
        );

        Ok(Self {
            client,
            request_timeout: config.request_timeout,
        })
    }

    /// The fixed header set sent with every upstream request
    pub fn browser_headers(config: &UpstreamConfig) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value("user_agent", &config.user_agent)?);
        headers.insert(ACCEPT, header_value("accept", &config.accept)?);
        headers.insert(
            ACCEPT_LANGUAGE,
            header_value("accept_language", &config.accept_language)?,
        );

        if let Some(referer) = config.referer.as_deref().filter(|r| !r.trim().is_empty()) {
            headers.insert(REFERER, header_value("referer", referer)?);
            if let Some(origin) = UrlUtils::origin_of(referer) {
                headers.insert(ORIGIN, header_value("referer", &origin)?);
            }
        }

        Ok(headers)
    }

    /// GET without a total timeout (media relaying)
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// GET bounded by the configured request timeout (catalog calls)
    pub fn get_with_timeout(&self, url: &str) -> RequestBuilder {
        self.client.get(url).timeout(self.request_timeout)
    }
}

fn header_value(field: &str, value: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(value.trim()).map_err(|e| {
        AppError::configuration(format!("upstream.{field} is not a valid header value: {e}"))
    })
}
