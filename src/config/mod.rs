use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

pub mod defaults;
pub mod duration_serde;

use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Settings for every outbound request made on behalf of a browser.
///
/// Some panels reject anything that does not look like a browser, so the
/// relay always presents the same browser-like header set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept")]
    pub accept: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    /// When set, sent as `Referer` and (origin part only) as `Origin`
    #[serde(default)]
    pub referer: Option<String>,
    /// Connect timeout only; relayed media streams have no total timeout
    #[serde(default = "default_connect_timeout", with = "duration_serde::duration")]
    pub connect_timeout: Duration,
    /// Total timeout for catalog calls
    #[serde(default = "default_request_timeout", with = "duration_serde::duration")]
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Route playlist entries back through `/x` so segments also traverse the relay
    #[serde(default = "default_rewrite_playlists")]
    pub rewrite_playlists: bool,
    /// Upper bound for playlist bodies buffered while rewriting
    #[serde(default = "default_max_playlist_bytes")]
    pub max_playlist_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_endpoint")]
    pub default_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_engine_load_timeout", with = "duration_serde::duration")]
    pub engine_load_timeout: Duration,
    #[serde(default = "default_native_mime_types")]
    pub native_mime_types: Vec<String>,
}

// Web defaults
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

// Upstream defaults
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_accept() -> String {
    DEFAULT_ACCEPT.to_string()
}

fn default_accept_language() -> String {
    DEFAULT_ACCEPT_LANGUAGE.to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
}

// Relay defaults
fn default_rewrite_playlists() -> bool {
    DEFAULT_REWRITE_PLAYLISTS
}

fn default_max_playlist_bytes() -> usize {
    DEFAULT_MAX_PLAYLIST_BYTES
}

fn default_catalog_endpoint() -> String {
    DEFAULT_CATALOG_ENDPOINT.to_string()
}

// Playback defaults
fn default_engine_load_timeout() -> Duration {
    Duration::from_secs(DEFAULT_ENGINE_LOAD_TIMEOUT_SECS)
}

fn default_native_mime_types() -> Vec<String> {
    DEFAULT_NATIVE_MIME_TYPES
        .iter()
        .map(|mime| mime.to_string())
        .collect()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept: default_accept(),
            accept_language: default_accept_language(),
            referer: None,
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            rewrite_playlists: default_rewrite_playlists(),
            max_playlist_bytes: default_max_playlist_bytes(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_endpoint: default_catalog_endpoint(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            engine_load_timeout: default_engine_load_timeout(),
            native_mime_types: default_native_mime_types(),
        }
    }
}

impl Config {
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        let mut config = if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)
                .with_context(|| format!("Failed to read config file {config_file}"))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {config_file}"))?
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            default_config
        };

        config.apply_port_override(std::env::var(PORT_ENV_VAR).ok())?;
        Ok(config)
    }

    /// Apply the value of the `PORT` environment variable, if any.
    ///
    /// Hosting platforms hand the listening port to the process this way, so it
    /// wins over the config file (CLI flags are applied afterwards by `main`).
    pub fn apply_port_override(&mut self, value: Option<String>) -> Result<()> {
        let Some(raw) = value else {
            return Ok(());
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            warn!("{} is set but empty, keeping port {}", PORT_ENV_VAR, self.web.port);
            return Ok(());
        }
        self.web.port = trimmed
            .parse()
            .with_context(|| format!("Invalid {PORT_ENV_VAR} value '{trimmed}'"))?;
        Ok(())
    }
}
