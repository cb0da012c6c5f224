//! Error type definitions for the relay
//!
//! Relay-side failures use [`AppError`], which the web layer maps to HTTP
//! responses. Client playback failures use [`PlaybackError`]; those never
//! become protocol errors and are reported to the UI as status strings.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Which relay surface an upstream call was made for.
///
/// The two surfaces report upstream failures with different statuses and
/// bodies, matching what browser clients of each route already expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    /// Media playlists and segments (`/x`, `/xplay`)
    Relay,
    /// Provider catalog API (`/xtream`)
    Catalog,
}

impl fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relay => f.write_str("relay"),
            Self::Catalog => f.write_str("catalog"),
        }
    }
}

/// Top-level relay error type
#[derive(Error, Debug)]
pub enum AppError {
    /// A required parameter is missing or malformed
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// The origin could not be reached before response headers arrived
    #[error("Upstream unavailable ({kind}): {url} - {message}")]
    UpstreamUnavailable {
        kind: UpstreamKind,
        url: String,
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Playback failures seen by a [`crate::playback::PlaybackSession`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// Neither the element nor the adaptive engine can play the stream
    #[error("Unsupported playback: {reason}")]
    UnsupportedPlayback { reason: String },

    /// The adaptive engine library could not be loaded
    #[error("Engine library failed to load: {message}")]
    EngineLoad { message: String },

    /// The adaptive engine library did not load in time
    #[error("Engine library load timed out after {}", format_timeout(.timeout))]
    EngineLoadTimeout { timeout: Duration },

    /// The engine loaded but reports no support on this platform
    #[error("Adaptive engine is not supported on this platform")]
    EngineUnsupported,

    /// The manifest could not be fetched or parsed
    #[error("Manifest error: {message}")]
    Manifest { message: String },

    /// The element refused to start playback (for example autoplay policy)
    #[error("Playback request rejected: {message}")]
    PlayRejected { message: String },

    /// The element rejected media data
    #[error("Media error: {message}")]
    Media { message: String },
}

fn format_timeout(timeout: &Duration) -> String {
    humantime::format_duration(*timeout).to_string()
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create an invalid request error with the short reason returned to clients
    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create an upstream unavailable error
    pub fn upstream_unavailable<U: Into<String>, M: Into<String>>(
        kind: UpstreamKind,
        url: U,
        message: M,
    ) -> Self {
        Self::UpstreamUnavailable {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl PlaybackError {
    pub fn unsupported<S: Into<String>>(reason: S) -> Self {
        Self::UnsupportedPlayback {
            reason: reason.into(),
        }
    }

    pub fn engine_load<S: Into<String>>(message: S) -> Self {
        Self::EngineLoad {
            message: message.into(),
        }
    }

    pub fn manifest<S: Into<String>>(message: S) -> Self {
        Self::Manifest {
            message: message.into(),
        }
    }

    pub fn play_rejected<S: Into<String>>(message: S) -> Self {
        Self::PlayRejected {
            message: message.into(),
        }
    }

    pub fn media<S: Into<String>>(message: S) -> Self {
        Self::Media {
            message: message.into(),
        }
    }
}
