//! URL utilities for consistent URL handling
//!
//! Helpers shared by the relay handlers and the playback engine: validating
//! relay targets, detecting playlist paths, resolving playlist entries and
//! keeping credentials out of the logs.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// File extension that marks a target path as an HLS playlist
pub const PLAYLIST_EXTENSION: &str = ".m3u8";

/// Query parameters that carry provider credentials
const SENSITIVE_PARAMS: &[&str] = &[
    "username", "password", "user", "pass", "pwd", "passwd", "u", "p",
];

static SENSITIVE_PARAM_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    SENSITIVE_PARAMS
        .iter()
        .filter_map(|param| Regex::new(&format!(r"(?i)([?&]{}=)[^&]*", regex::escape(param))).ok())
        .collect()
});

// Xtream media paths embed credentials: /live/<user>/<pass>/<id>.<ext>
static XTREAM_PATH_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)/(live|movie|series|timeshift)/[^/?#]+/[^/?#]+/").ok()
});

/// URL utilities for consistent URL handling
pub struct UrlUtils;

impl UrlUtils {
    /// Parse a relay target, accepting only absolute http(s) URLs
    ///
    /// # Examples
    ///
    /// ```rust
    /// use xtream_relay::utils::url::UrlUtils;
    ///
    /// assert!(UrlUtils::parse_relay_target("http://origin.example.com/a.m3u8").is_some());
    /// assert!(UrlUtils::parse_relay_target("ftp://origin.example.com/a.m3u8").is_none());
    /// assert!(UrlUtils::parse_relay_target("/relative/path.ts").is_none());
    /// ```
    pub fn parse_relay_target(url: &str) -> Option<Url> {
        let parsed = Url::parse(url.trim()).ok()?;
        match parsed.scheme() {
            "http" | "https" if parsed.host_str().is_some() => Some(parsed),
            _ => None,
        }
    }

    /// Whether the URL's path (ignoring query and fragment) names an HLS playlist
    pub fn is_playlist_path(url: &str) -> bool {
        Self::strip_query_and_fragment(url)
            .to_ascii_lowercase()
            .ends_with(PLAYLIST_EXTENSION)
    }

    /// Drop everything from the first `?` or `#`
    pub fn strip_query_and_fragment(url: &str) -> &str {
        match url.find(['?', '#']) {
            Some(pos) => &url[..pos],
            None => url,
        }
    }

    /// Resolve a playlist entry (variant, segment or key URI) against the playlist URL
    ///
    /// Absolute entries are returned unchanged; root-relative and relative
    /// entries are joined onto the playlist URL.
    pub fn absolutize(base_playlist_url: &str, entry: &str) -> String {
        if entry.starts_with("http://") || entry.starts_with("https://") {
            return entry.to_string();
        }
        match Url::parse(base_playlist_url).and_then(|base| base.join(entry)) {
            Ok(joined) => joined.to_string(),
            Err(_) => match base_playlist_url.rfind('/') {
                Some(pos) => format!("{}{}", &base_playlist_url[..=pos], entry),
                None => entry.to_string(),
            },
        }
    }

    /// Base URL of a provider given as `host[:port]` or with an explicit scheme
    ///
    /// Bare hosts are reached over plain http, as IPTV panels usually are.
    /// Trailing slashes are dropped so paths can be appended directly.
    pub fn provider_base_url(host: &str) -> String {
        let host = host.trim().trim_end_matches('/');
        let lower = host.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{host}")
        }
    }

    /// Origin (`scheme://host[:port]`) of a URL, used for the `Origin` header
    pub fn origin_of(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        match parsed.origin() {
            origin @ url::Origin::Tuple(..) => Some(origin.ascii_serialization()),
            url::Origin::Opaque(_) => None,
        }
    }

    /// Obfuscate sensitive information in URLs for safe logging
    ///
    /// Masks URL userinfo, credential query parameters and the credential
    /// segments of Xtream media paths.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use xtream_relay::utils::url::UrlUtils;
    ///
    /// let url = "http://panel.example.com/live/alice/secret/42.m3u8";
    /// assert_eq!(
    ///     UrlUtils::obfuscate_credentials(url),
    ///     "http://panel.example.com/live/****/****/42.m3u8"
    /// );
    /// ```
    pub fn obfuscate_credentials(url: &str) -> String {
        let mut obfuscated = url.to_string();

        if let Ok(parsed) = Url::parse(url)
            && (!parsed.username().is_empty() || parsed.password().is_some())
        {
            let mut new_url = parsed.clone();
            let _ = new_url.set_username("****");
            let _ = new_url.set_password(Some("****"));
            obfuscated = new_url.to_string();
        }

        for re in SENSITIVE_PARAM_PATTERNS.iter() {
            obfuscated = re.replace_all(&obfuscated, "${1}****").to_string();
        }

        if let Some(re) = XTREAM_PATH_PATTERN.as_ref() {
            obfuscated = re.replace_all(&obfuscated, "/${1}/****/****/").to_string();
        }

        obfuscated
    }
}
