//! Playback engine seams
//!
//! A [`PlaybackSession`](crate::playback::PlaybackSession) drives a
//! [`MediaElement`] either directly (native HLS support) or through an
//! adaptive [`PlaybackEngine`]. Engines come from an [`EngineProvider`]; the
//! production [`LazyEngineProvider`] loads its [`EngineLibrary`] once per
//! process, on first use.

use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::errors::{PlaybackError, PlaybackResult};
use crate::playback::manifest::PlaylistKind;

/// What a segment handed to the element contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Initialisation section (`#EXT-X-MAP`) preceding fMP4 media
    Init,
    Media { sequence: u64 },
}

/// Media bytes fed to an element by an engine
#[derive(Debug, Clone)]
pub struct SegmentData {
    pub kind: SegmentKind,
    pub uri: String,
    pub bytes: Bytes,
}

/// The playback surface (a video element in a browser)
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Whether the element can play `mime_type` without help
    fn can_play_type(&self, mime_type: &str) -> bool;

    /// Point the element at a URL it fetches itself; `None` clears the source
    fn set_source(&self, url: Option<&str>);

    /// Request playback; may be refused (autoplay policy)
    async fn play(&self) -> PlaybackResult<()>;

    /// Append media fetched by an engine
    async fn append_segment(&self, segment: SegmentData) -> PlaybackResult<()>;
}

/// Manifest details reported once an engine has parsed a source
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestInfo {
    /// URL the engine was asked to load
    pub url: String,
    pub kind: PlaylistKind,
    /// Variants listed by a master playlist, 0 for a media playlist
    pub variant_count: usize,
    /// Media playlist actually followed
    pub media_playlist_url: String,
    pub target_duration: Option<f32>,
    pub is_live: bool,
}

/// One adaptive playback engine instance bound to at most one element
pub trait PlaybackEngine: Send {
    fn attach_media(&mut self, element: Arc<dyn MediaElement>);

    /// Start loading `url`; the receiver resolves once the manifest is parsed
    fn load_source(&mut self, url: &str) -> oneshot::Receiver<PlaybackResult<ManifestInfo>>;

    /// Stop all loading and release the element
    fn destroy(&mut self);
}

/// Entry point of a loaded engine library
pub trait EngineFactory: Send + Sync {
    fn is_supported(&self) -> bool;

    fn create_engine(&self) -> Box<dyn PlaybackEngine>;
}

/// Loads an engine library; the expensive, fallible step
#[async_trait]
pub trait EngineLibrary: Send + Sync {
    async fn load(&self) -> PlaybackResult<Arc<dyn EngineFactory>>;
}

/// Source of engine instances for playback sessions
#[async_trait]
pub trait EngineProvider: Send + Sync {
    /// A fresh engine, or why none is available
    async fn obtain(&self) -> PlaybackResult<Box<dyn PlaybackEngine>>;
}

/// Lifecycle of the lazily loaded engine library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLoadState {
    NotLoaded,
    Loading,
    Ready,
    /// Terminal: the library is never loaded a second time
    Failed { reason: String },
}

impl fmt::Display for EngineLoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLoaded => f.write_str("not loaded"),
            Self::Loading => f.write_str("loading"),
            Self::Ready => f.write_str("ready"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

type LoadFuture = Shared<BoxFuture<'static, PlaybackResult<Arc<dyn EngineFactory>>>>;

/// Engine provider that loads its library exactly once
///
/// The first [`obtain`](EngineProvider::obtain) spawns the load; concurrent
/// and later callers await the same result. The load runs on its own task,
/// so a caller that stops waiting (timeout) does not cancel it. Share one
/// instance across sessions through an `Arc`.
pub struct LazyEngineProvider {
    library: Arc<dyn EngineLibrary>,
    load: OnceLock<LoadFuture>,
    state: Arc<watch::Sender<EngineLoadState>>,
}

impl LazyEngineProvider {
    pub fn new(library: Arc<dyn EngineLibrary>) -> Self {
        let (state, _) = watch::channel(EngineLoadState::NotLoaded);
        Self {
            library,
            load: OnceLock::new(),
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> EngineLoadState {
        self.state.borrow().clone()
    }

    fn load_future(&self) -> LoadFuture {
        self.load
            .get_or_init(|| {
                let library = Arc::clone(&self.library);
                let state = Arc::clone(&self.state);
                state.send_replace(EngineLoadState::Loading);
                info!("Loading adaptive playback engine library");

                let handle = tokio::spawn(async move {
                    let result = library.load().await;
                    let next = match &result {
                        Ok(_) => {
                            info!("Adaptive playback engine library ready");
                            EngineLoadState::Ready
                        }
                        Err(e) => {
                            warn!("Adaptive playback engine library failed to load: {}", e);
                            EngineLoadState::Failed {
                                reason: e.to_string(),
                            }
                        }
                    };
                    state.send_replace(next);
                    result
                });

                async move {
                    handle.await.unwrap_or_else(|e| {
                        Err(PlaybackError::engine_load(format!("loader task failed: {e}")))
                    })
                }
                .boxed()
                .shared()
            })
            .clone()
    }
}

#[async_trait]
impl EngineProvider for LazyEngineProvider {
    async fn obtain(&self) -> PlaybackResult<Box<dyn PlaybackEngine>> {
        let factory = self.load_future().await?;
        if !factory.is_supported() {
            debug!("Engine library loaded but unsupported on this platform");
            return Err(PlaybackError::EngineUnsupported);
        }
        Ok(factory.create_engine())
    }
}
