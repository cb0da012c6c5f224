//! Client-side playback adaptation
//!
//! Chooses how to render a relay-served stream: natively when the element
//! understands HLS, otherwise through an adaptive engine loaded on demand.

pub mod engine;
pub mod hls;
pub mod manifest;
pub mod session;

pub use engine::{
    EngineFactory, EngineLibrary, EngineLoadState, EngineProvider, LazyEngineProvider,
    ManifestInfo, MediaElement, PlaybackEngine, SegmentData, SegmentKind,
};
pub use hls::{HlsEngine, HlsEngineLibrary};
pub use session::{Capability, PlaybackMode, PlaybackSession, SessionState, StartOutcome};
