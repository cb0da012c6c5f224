//! Stateless relay surfaces
//!
//! - [`http_stream`]: media playlists and segments (`/x`, `/xplay`)
//! - [`catalog`]: provider catalog API calls (`/xtream`)
//!
//! Both share the CORS policy and header filtering in [`headers`].

pub mod catalog;
pub mod headers;
pub mod http_stream;
pub mod playlist_rewrite;

pub use catalog::{CatalogRequest, fetch_catalog};
pub use http_stream::{LiveStreamParams, RelayRequest, relay_stream};
