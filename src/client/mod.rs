//! Catalog client for a relay UI
//!
//! Lists provider categories and live streams through the relay's `/xtream`
//! route, filters and sorts them for display, and builds the relay media
//! URLs handed to a [`PlaybackSession`](crate::playback::PlaybackSession).

pub mod credentials;

use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::errors::{AppError, AppResult, UpstreamKind};
use crate::proxy::http_stream::DEFAULT_LIVE_STREAM_TYPE;
use crate::proxy::playlist_rewrite::RELAY_PATH;
use crate::utils::url::UrlUtils;

pub use credentials::Credentials;

/// Catalog action listing live categories
pub const ACTION_LIVE_CATEGORIES: &str = "get_live_categories";

/// Catalog action listing live streams of a category
pub const ACTION_LIVE_STREAMS: &str = "get_live_streams";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "string_or_number")]
    pub category_id: String,
    #[serde(default)]
    pub category_name: Option<String>,
}

impl Category {
    /// Name for display, falling back to the id
    pub fn display_name(&self) -> String {
        match self.category_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("Category #{}", self.category_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LiveStream {
    #[serde(deserialize_with = "string_or_number")]
    pub stream_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub stream_icon: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub category_id: Option<String>,
}

impl LiveStream {
    fn sort_name(&self) -> String {
        self.name.as_deref().unwrap_or("").to_lowercase()
    }

    // Non-numeric ids sort as 0
    fn numeric_id(&self) -> u64 {
        self.stream_id.trim().parse().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Name,
    Id,
}

/// Case-insensitive name filter followed by a stable sort
pub fn filter_streams(streams: &[LiveStream], query: &str, sort: SortOrder) -> Vec<LiveStream> {
    let needle = query.trim().to_lowercase();
    let mut items: Vec<LiveStream> = streams
        .iter()
        .filter(|s| needle.is_empty() || s.sort_name().contains(&needle))
        .cloned()
        .collect();

    items.sort_by(|a, b| match sort {
        SortOrder::Id => a.numeric_id().cmp(&b.numeric_id()),
        SortOrder::Name => a.sort_name().cmp(&b.sort_name()),
    });
    items
}

/// Talks to one provider through one relay
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Client,
    relay_base: Url,
    credentials: Credentials,
    endpoint: String,
}

impl CatalogClient {
    pub fn new(http: Client, relay_base: &str, credentials: Credentials) -> AppResult<Self> {
        let relay_base = Url::parse(relay_base.trim_end_matches('/'))
            .map_err(|e| AppError::configuration(format!("Invalid relay URL '{relay_base}': {e}")))?;
        Ok(Self {
            http,
            relay_base,
            credentials,
            endpoint: crate::config::defaults::DEFAULT_CATALOG_ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Relay `/xtream` URL for a catalog action
    pub fn catalog_url(&self, action: &str, extra: &[(&str, &str)]) -> Url {
        let mut url = self.relay_url_for("/xtream");
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("host", &self.credentials.host)
                .append_pair("username", &self.credentials.username)
                .append_pair("password", &self.credentials.password)
                .append_pair("endpoint", &self.endpoint)
                .append_pair("action", action);
            for (key, value) in extra {
                query.append_pair(key, value);
            }
        }
        url
    }

    /// Relay `/xplay` URL for a live stream
    pub fn play_url(&self, stream_id: &str) -> Url {
        let mut url = self.relay_url_for("/xplay");
        url.query_pairs_mut()
            .append_pair("host", &self.credentials.host)
            .append_pair("u", &self.credentials.username)
            .append_pair("p", &self.credentials.password)
            .append_pair("stream", stream_id)
            .append_pair("type", DEFAULT_LIVE_STREAM_TYPE);
        url
    }

    /// Relay `/x` URL for any absolute media URL
    pub fn media_url(&self, absolute_url: &str) -> Url {
        let mut url = self.relay_url_for(RELAY_PATH);
        url.query_pairs_mut().append_pair("url", absolute_url);
        url
    }

    fn relay_url_for(&self, path: &str) -> Url {
        let mut url = self.relay_base.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base_path}{path}"));
        url.set_query(None);
        url
    }

    pub async fn live_categories(&self) -> AppResult<Vec<Category>> {
        self.fetch_list(self.catalog_url(ACTION_LIVE_CATEGORIES, &[]))
            .await
    }

    pub async fn live_streams(&self, category_id: &str) -> AppResult<Vec<LiveStream>> {
        self.fetch_list(self.catalog_url(ACTION_LIVE_STREAMS, &[("category_id", category_id)]))
            .await
    }

    /// Fetch a JSON list; anything that is not an array reads as empty
    async fn fetch_list<T>(&self, url: Url) -> AppResult<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        if !self.credentials.is_complete() {
            return Err(AppError::invalid_request("Missing credentials"));
        }
        let safe_url = UrlUtils::obfuscate_credentials(url.as_str());
        let upstream_error = |message: String| {
            AppError::upstream_unavailable(UpstreamKind::Catalog, &safe_url, message)
        };

        let response = self
            .http
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| upstream_error(UrlUtils::obfuscate_credentials(&e.to_string())))?;
        let status = response.status();
        if !status.is_success() {
            return Err(upstream_error(format!("relay answered {status}")));
        }
        let value: Value = response
            .json()
            .await
            .map_err(|e| upstream_error(format!("invalid JSON: {e}")))?;

        let Value::Array(items) = value else {
            debug!("Catalog returned a non-list body for {}", safe_url);
            return Ok(Vec::new());
        };
        let total = items.len();
        let parsed: Vec<T> = items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect();
        if parsed.len() < total {
            warn!(
                "Skipped {} malformed catalog entries from {}",
                total - parsed.len(),
                safe_url
            );
        }
        Ok(parsed)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        _ => Ok(None),
    }
}
