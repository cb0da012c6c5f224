//! Utility modules shared by the relay and the playback client.

pub mod http_client;
pub mod url;

pub use http_client::UpstreamClient;
pub use url::UrlUtils;
