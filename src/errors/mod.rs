//! Centralized error handling for the relay
//!
//! # Error Categories
//!
//! - **Invalid requests**: a required query parameter is missing or malformed
//! - **Upstream failures**: the origin is unreachable before headers arrive
//! - **Playback failures**: client-side engine and element problems
//!
//! # Usage
//!
//! ```rust
//! use xtream_relay::errors::{AppError, AppResult};
//!
//! fn require_url(url: Option<&str>) -> AppResult<&str> {
//!     url.ok_or_else(|| AppError::invalid_request("Missing url"))
//! }
//!
//! assert!(require_url(None).is_err());
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for playback Results
pub type PlaybackResult<T> = Result<T, PlaybackError>;
