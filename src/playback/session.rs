//! Client playback session
//!
//! One session per media element. `start` probes native HLS support and
//! either hands the URL straight to the element or drives it through an
//! adaptive engine obtained from the injected [`EngineProvider`]. When no
//! engine can be had in time, the URL is assigned directly as a fallback.
//!
//! Starts are numbered; only the newest may touch the element. An older
//! start that resumes after a newer one began returns
//! [`StartOutcome::Superseded`] and destroys any engine it created.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::PlaybackConfig;
use crate::errors::PlaybackError;
use crate::playback::engine::{EngineProvider, ManifestInfo, MediaElement, PlaybackEngine};
use crate::utils::url::UrlUtils;

/// Whether the element plays HLS by itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Native,
    NeedsLibrary,
}

/// How the current source is being played
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    Native,
    Library,
    /// Engine unavailable; source assigned directly
    Fallback,
}

impl fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Library => f.write_str("library"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    CapabilityProbed,
    NativeSource,
    LibraryAttached,
    Playing,
    Error,
}

/// Result of [`PlaybackSession::start`]
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// Playback requested natively or through an engine
    Playing { mode: PlaybackMode },
    /// No engine was available; the source was assigned directly
    FallbackUsed { reason: PlaybackError },
    /// The engine could not play the source
    Failed { error: PlaybackError },
    /// A newer start or a reset took over
    Superseded,
}

struct SessionInner {
    state: SessionState,
    mode: Option<PlaybackMode>,
    source: Option<String>,
    /// The element was given a URL to fetch itself (native or fallback)
    direct_source: bool,
    engine: Option<Box<dyn PlaybackEngine>>,
    manifest: Option<ManifestInfo>,
    status: Option<String>,
}

impl SessionInner {
    fn release_engine(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            debug!("Destroying previous playback engine");
            engine.destroy();
        }
        self.manifest = None;
    }
}

pub struct PlaybackSession {
    element: Arc<dyn MediaElement>,
    provider: Arc<dyn EngineProvider>,
    config: PlaybackConfig,
    generation: AtomicU64,
    inner: Mutex<SessionInner>,
}

impl PlaybackSession {
    pub fn new(
        element: Arc<dyn MediaElement>,
        provider: Arc<dyn EngineProvider>,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            element,
            provider,
            config,
            generation: AtomicU64::new(0),
            inner: Mutex::new(SessionInner {
                state: SessionState::Idle,
                mode: None,
                source: None,
                direct_source: false,
                engine: None,
                manifest: None,
                status: None,
            }),
        }
    }

    pub fn detect_capability(&self) -> Capability {
        let native = self
            .config
            .native_mime_types
            .iter()
            .any(|mime| self.element.can_play_type(mime));
        if native {
            Capability::Native
        } else {
            Capability::NeedsLibrary
        }
    }

    /// Play `url`, replacing whatever the session was playing
    pub async fn start(&self, url: &str) -> StartOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let safe_url = UrlUtils::obfuscate_credentials(url);
        let capability = self.detect_capability();
        debug!("Start #{} for {} ({:?})", generation, safe_url, capability);

        {
            let mut inner = self.inner.lock().await;
            if self.is_stale(generation) {
                return StartOutcome::Superseded;
            }
            inner.release_engine();
            inner.state = SessionState::CapabilityProbed;
            inner.source = Some(url.to_string());
            inner.mode = None;
            inner.status = None;
        }

        match capability {
            Capability::Native => self.start_native(generation, url).await,
            Capability::NeedsLibrary => self.start_with_engine(generation, url).await,
        }
    }

    async fn start_native(&self, generation: u64, url: &str) -> StartOutcome {
        {
            let mut inner = self.inner.lock().await;
            if self.is_stale(generation) {
                return StartOutcome::Superseded;
            }
            self.element.set_source(Some(url));
            inner.direct_source = true;
            inner.state = SessionState::NativeSource;
            inner.mode = Some(PlaybackMode::Native);
        }
        self.request_play().await;
        self.mark_playing(generation, StartOutcome::Playing {
            mode: PlaybackMode::Native,
        })
        .await
    }

    async fn start_with_engine(&self, generation: u64, url: &str) -> StartOutcome {
        let timeout = self.config.engine_load_timeout;
        let obtained = match tokio::time::timeout(timeout, self.provider.obtain()).await {
            Ok(obtained) => obtained,
            Err(_) => Err(PlaybackError::EngineLoadTimeout { timeout }),
        };

        let mut engine = match obtained {
            Ok(engine) => engine,
            Err(reason) => return self.start_fallback(generation, url, reason).await,
        };

        let parsed = {
            let mut inner = self.inner.lock().await;
            if self.is_stale(generation) {
                engine.destroy();
                return StartOutcome::Superseded;
            }
            inner.release_engine();
            // An earlier native or fallback start may still be fetching its URL
            if inner.direct_source {
                self.element.set_source(None);
                inner.direct_source = false;
            }
            engine.attach_media(Arc::clone(&self.element));
            let parsed = engine.load_source(url);
            inner.engine = Some(engine);
            inner.state = SessionState::LibraryAttached;
            inner.mode = Some(PlaybackMode::Library);
            parsed
        };

        let manifest = match parsed.await {
            Ok(result) => result,
            Err(_) => Err(PlaybackError::manifest("engine stopped before parsing the manifest")),
        };

        match manifest {
            Ok(info) => {
                {
                    let mut inner = self.inner.lock().await;
                    if self.is_stale(generation) {
                        return StartOutcome::Superseded;
                    }
                    inner.manifest = Some(info);
                }
                self.request_play().await;
                self.mark_playing(generation, StartOutcome::Playing {
                    mode: PlaybackMode::Library,
                })
                .await
            }
            Err(error) => {
                let mut inner = self.inner.lock().await;
                if self.is_stale(generation) {
                    return StartOutcome::Superseded;
                }
                inner.release_engine();
                inner.state = SessionState::Error;
                inner.status = Some(PlaybackError::unsupported(error.to_string()).to_string());
                warn!(
                    "Engine could not play {}: {}",
                    UrlUtils::obfuscate_credentials(url),
                    error
                );
                StartOutcome::Failed { error }
            }
        }
    }

    async fn start_fallback(&self, generation: u64, url: &str, reason: PlaybackError) -> StartOutcome {
        {
            let mut inner = self.inner.lock().await;
            if self.is_stale(generation) {
                return StartOutcome::Superseded;
            }
            warn!("Adaptive engine unavailable ({}), assigning source directly", reason);
            inner.release_engine();
            self.element.set_source(Some(url));
            inner.direct_source = true;
            inner.state = SessionState::NativeSource;
            inner.mode = Some(PlaybackMode::Fallback);
        }
        self.request_play().await;
        self.mark_playing(generation, StartOutcome::FallbackUsed { reason })
            .await
    }

    // Play rejections (autoplay policy) leave the element paused, nothing more
    async fn request_play(&self) {
        if let Err(e) = self.element.play().await {
            debug!("Play request rejected: {}", e);
        }
    }

    async fn mark_playing(&self, generation: u64, outcome: StartOutcome) -> StartOutcome {
        let mut inner = self.inner.lock().await;
        if self.is_stale(generation) {
            return StartOutcome::Superseded;
        }
        inner.state = SessionState::Playing;
        if let Some(mode) = inner.mode {
            info!("Playing in {} mode", mode);
        }
        outcome
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    /// Release the engine, clear the source and supersede any pending start
    pub async fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().await;
        inner.release_engine();
        self.element.set_source(None);
        inner.direct_source = false;
        inner.state = SessionState::Idle;
        inner.mode = None;
        inner.source = None;
        inner.status = None;
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub async fn mode(&self) -> Option<PlaybackMode> {
        self.inner.lock().await.mode
    }

    pub async fn current_source(&self) -> Option<String> {
        self.inner.lock().await.source.clone()
    }

    /// Status line for the UI after a failure
    pub async fn status(&self) -> Option<String> {
        self.inner.lock().await.status.clone()
    }

    pub async fn manifest(&self) -> Option<ManifestInfo> {
        self.inner.lock().await.manifest.clone()
    }

    pub async fn has_engine(&self) -> bool {
        self.inner.lock().await.engine.is_some()
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.inner.get_mut().release_engine();
    }
}
