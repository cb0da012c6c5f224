/// Configuration default values
///
/// All default values for configuration options live here so they can be
/// changed in one place.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 10000;
pub const PORT_ENV_VAR: &str = "PORT";

// Upstream client defaults
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";
pub const DEFAULT_ACCEPT: &str = "*/*";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// Relay defaults
pub const DEFAULT_REWRITE_PLAYLISTS: bool = false;
pub const DEFAULT_MAX_PLAYLIST_BYTES: usize = 256 * 1024;

// Catalog defaults
pub const DEFAULT_CATALOG_ENDPOINT: &str = "player_api.php";

// Playback defaults
pub const DEFAULT_ENGINE_LOAD_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_NATIVE_MIME_TYPES: &[&str] =
    &["application/vnd.apple.mpegurl", "application/x-mpegurl"];
