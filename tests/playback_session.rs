//! Playback session behaviour with stub engines and providers

mod common;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::RecordingElement;
use tokio::sync::oneshot;
use xtream_relay::config::PlaybackConfig;
use xtream_relay::errors::{PlaybackError, PlaybackResult};
use xtream_relay::playback::manifest::PlaylistKind;
use xtream_relay::playback::{
    EngineFactory, EngineLibrary, EngineProvider, LazyEngineProvider, ManifestInfo, MediaElement,
    PlaybackEngine, PlaybackMode, PlaybackSession, SegmentData, SessionState, StartOutcome,
};

const STREAM_A: &str = "http://relay.example.com/xplay?host=h&u=a&p=b&stream=1&type=m3u8";
const STREAM_B: &str = "http://relay.example.com/xplay?host=h&u=a&p=b&stream=2&type=m3u8";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Attach(usize),
    Load(usize, String),
    Destroy(usize),
}

type EventLog = Arc<Mutex<Vec<Event>>>;

struct StubEngine {
    id: usize,
    log: EventLog,
    manifest: Result<(), PlaybackError>,
}

impl PlaybackEngine for StubEngine {
    fn attach_media(&mut self, _element: Arc<dyn MediaElement>) {
        self.log.lock().unwrap().push(Event::Attach(self.id));
    }

    fn load_source(&mut self, url: &str) -> oneshot::Receiver<PlaybackResult<ManifestInfo>> {
        self.log
            .lock()
            .unwrap()
            .push(Event::Load(self.id, url.to_string()));
        let (tx, rx) = oneshot::channel();
        let result = self.manifest.clone().map(|()| ManifestInfo {
            url: url.to_string(),
            kind: PlaylistKind::Media,
            variant_count: 0,
            media_playlist_url: url.to_string(),
            target_duration: Some(6.0),
            is_live: true,
        });
        let _ = tx.send(result);
        rx
    }

    fn destroy(&mut self) {
        self.log.lock().unwrap().push(Event::Destroy(self.id));
    }
}

enum Obtain {
    Engine { delay: Duration },
    Fail(PlaybackError),
    Hang,
}

/// Hands out stub engines following a per-call script
struct ScriptedProvider {
    script: Mutex<VecDeque<Obtain>>,
    manifest: Result<(), PlaybackError>,
    obtained: AtomicUsize,
    log: EventLog,
}

impl ScriptedProvider {
    fn new(script: Vec<Obtain>) -> Arc<Self> {
        Self::with_manifest(script, Ok(()))
    }

    fn with_manifest(script: Vec<Obtain>, manifest: Result<(), PlaybackError>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            manifest,
            obtained: AtomicUsize::new(0),
            log: Arc::default(),
        })
    }

    fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }

    fn calls(&self) -> usize {
        self.obtained.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineProvider for ScriptedProvider {
    async fn obtain(&self) -> PlaybackResult<Box<dyn PlaybackEngine>> {
        let id = self.obtained.fetch_add(1, Ordering::SeqCst) + 1;
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Obtain::Engine {
                delay: Duration::ZERO,
            });
        match step {
            Obtain::Engine { delay } => {
                tokio::time::sleep(delay).await;
                Ok(Box::new(StubEngine {
                    id,
                    log: Arc::clone(&self.log),
                    manifest: self.manifest.clone(),
                }))
            }
            Obtain::Fail(error) => Err(error),
            Obtain::Hang => std::future::pending().await,
        }
    }
}

fn session(element: Arc<RecordingElement>, provider: Arc<dyn EngineProvider>) -> PlaybackSession {
    PlaybackSession::new(element, provider, PlaybackConfig::default())
}

fn session_on(element: Arc<SwitchableElement>, provider: Arc<dyn EngineProvider>) -> PlaybackSession {
    PlaybackSession::new(element, provider, PlaybackConfig::default())
}

#[tokio::test]
async fn native_element_never_obtains_an_engine() {
    let element = Arc::new(RecordingElement::native());
    let provider = ScriptedProvider::new(vec![]);
    let session = session(element.clone(), provider.clone());

    let outcome = session.start(STREAM_A).await;

    assert_eq!(outcome, StartOutcome::Playing { mode: PlaybackMode::Native });
    assert_eq!(provider.calls(), 0);
    assert_eq!(element.sources(), vec![Some(STREAM_A.to_string())]);
    assert_eq!(element.play_count(), 1);
    assert_eq!(session.state().await, SessionState::Playing);
    assert_eq!(session.mode().await, Some(PlaybackMode::Native));
}

#[tokio::test]
async fn rejected_play_is_swallowed() {
    let element = Arc::new(RecordingElement {
        reject_play: true,
        ..RecordingElement::native()
    });
    let session = session(element.clone(), ScriptedProvider::new(vec![]));

    let outcome = session.start(STREAM_A).await;
    assert_eq!(outcome, StartOutcome::Playing { mode: PlaybackMode::Native });
    assert_eq!(element.play_count(), 1);
}

#[tokio::test]
async fn engine_plays_after_manifest_is_parsed() {
    let element = Arc::new(RecordingElement::without_hls());
    let provider = ScriptedProvider::new(vec![]);
    let session = session(element.clone(), provider.clone());

    let outcome = session.start(STREAM_A).await;

    assert_eq!(outcome, StartOutcome::Playing { mode: PlaybackMode::Library });
    assert_eq!(
        provider.events(),
        vec![Event::Attach(1), Event::Load(1, STREAM_A.to_string())]
    );
    assert!(element.sources().is_empty());
    assert_eq!(element.play_count(), 1);
    assert!(session.has_engine().await);
    assert_eq!(
        session.manifest().await.map(|m| m.url),
        Some(STREAM_A.to_string())
    );
}

#[tokio::test]
async fn switching_sources_destroys_the_previous_engine_first() {
    let element = Arc::new(RecordingElement::without_hls());
    let provider = ScriptedProvider::new(vec![]);
    let session = session(element, provider.clone());

    session.start(STREAM_A).await;
    session.start(STREAM_B).await;

    assert_eq!(
        provider.events(),
        vec![
            Event::Attach(1),
            Event::Load(1, STREAM_A.to_string()),
            Event::Destroy(1),
            Event::Attach(2),
            Event::Load(2, STREAM_B.to_string()),
        ]
    );
    assert_eq!(session.current_source().await, Some(STREAM_B.to_string()));
}

#[tokio::test]
async fn last_start_wins() {
    let element = Arc::new(RecordingElement::without_hls());
    let provider = ScriptedProvider::new(vec![
        Obtain::Engine {
            delay: Duration::from_millis(150),
        },
        Obtain::Engine {
            delay: Duration::ZERO,
        },
    ]);
    let session = Arc::new(session(element, provider.clone()));

    let first = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.start(STREAM_A).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = session.start(STREAM_B).await;
    let first = first.await.unwrap();

    assert_eq!(second, StartOutcome::Playing { mode: PlaybackMode::Library });
    assert_eq!(first, StartOutcome::Superseded);

    // The stale engine was destroyed without ever touching the element
    let events = provider.events();
    assert!(events.contains(&Event::Destroy(1)));
    assert!(!events.contains(&Event::Attach(1)));
    assert!(!events.contains(&Event::Destroy(2)));
    assert_eq!(session.current_source().await, Some(STREAM_B.to_string()));
    assert_eq!(session.state().await, SessionState::Playing);
}

/// Element whose native HLS support can be switched off mid-test
///
/// The first `play` can be held back to keep a native start in flight.
struct SwitchableElement {
    inner: RecordingElement,
    native: AtomicBool,
    first_play_delay: Mutex<Option<Duration>>,
}

impl SwitchableElement {
    fn native(first_play_delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            inner: RecordingElement::native(),
            native: AtomicBool::new(true),
            first_play_delay: Mutex::new(first_play_delay),
        })
    }

    fn lose_native_support(&self) {
        self.native.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaElement for SwitchableElement {
    fn can_play_type(&self, mime_type: &str) -> bool {
        self.native.load(Ordering::SeqCst) && self.inner.can_play_type(mime_type)
    }

    fn set_source(&self, url: Option<&str>) {
        self.inner.set_source(url);
    }

    async fn play(&self) -> PlaybackResult<()> {
        let delay = self.first_play_delay.lock().unwrap().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.play().await
    }

    async fn append_segment(&self, segment: SegmentData) -> PlaybackResult<()> {
        self.inner.append_segment(segment).await
    }
}

#[tokio::test]
async fn library_start_clears_an_earlier_fallback_source() {
    let element = Arc::new(RecordingElement::without_hls());
    let provider = ScriptedProvider::new(vec![
        Obtain::Fail(PlaybackError::engine_load("transient")),
        Obtain::Engine {
            delay: Duration::ZERO,
        },
    ]);
    let session = session(element.clone(), provider.clone());

    let a = session.start(STREAM_A).await;
    let b = session.start(STREAM_B).await;

    assert!(matches!(a, StartOutcome::FallbackUsed { .. }));
    assert_eq!(b, StartOutcome::Playing { mode: PlaybackMode::Library });
    // The element stops fetching A before the engine feeds B
    assert_eq!(element.sources(), vec![Some(STREAM_A.to_string()), None]);
    assert_eq!(
        provider.events(),
        vec![Event::Attach(2), Event::Load(2, STREAM_B.to_string())]
    );
}

#[tokio::test]
async fn library_start_clears_an_earlier_native_source() {
    let element = SwitchableElement::native(None);
    let provider = ScriptedProvider::new(vec![]);
    let session = session_on(element.clone(), provider.clone());

    let a = session.start(STREAM_A).await;
    element.lose_native_support();
    let b = session.start(STREAM_B).await;

    assert_eq!(a, StartOutcome::Playing { mode: PlaybackMode::Native });
    assert_eq!(b, StartOutcome::Playing { mode: PlaybackMode::Library });
    assert_eq!(element.inner.sources(), vec![Some(STREAM_A.to_string()), None]);
    assert_eq!(session.mode().await, Some(PlaybackMode::Library));
}

#[tokio::test]
async fn stale_native_start_yields_to_library_start() {
    let element = SwitchableElement::native(Some(Duration::from_millis(150)));
    let provider = ScriptedProvider::new(vec![]);
    let session = Arc::new(session_on(element.clone(), provider.clone()));

    let first = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.start(STREAM_A).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    element.lose_native_support();
    let second = session.start(STREAM_B).await;
    let first = first.await.unwrap();

    assert_eq!(second, StartOutcome::Playing { mode: PlaybackMode::Library });
    assert_eq!(first, StartOutcome::Superseded);
    assert_eq!(element.inner.sources(), vec![Some(STREAM_A.to_string()), None]);
    assert_eq!(session.mode().await, Some(PlaybackMode::Library));
    assert_eq!(session.state().await, SessionState::Playing);
    assert!(session.has_engine().await);
}

#[tokio::test]
async fn stale_fallback_does_not_override_newer_library_start() {
    let element = Arc::new(RecordingElement::without_hls());
    let provider = ScriptedProvider::new(vec![
        Obtain::Hang,
        Obtain::Engine {
            delay: Duration::ZERO,
        },
    ]);
    let config = PlaybackConfig {
        engine_load_timeout: Duration::from_millis(100),
        ..PlaybackConfig::default()
    };
    let session = Arc::new(PlaybackSession::new(element.clone(), provider.clone(), config));

    let first = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.start(STREAM_A).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = session.start(STREAM_B).await;
    let first = first.await.unwrap();

    assert_eq!(second, StartOutcome::Playing { mode: PlaybackMode::Library });
    assert_eq!(first, StartOutcome::Superseded);
    // The timed-out start never assigned A directly
    assert!(element.sources().is_empty());
    assert_eq!(session.mode().await, Some(PlaybackMode::Library));
    assert!(session.has_engine().await);
}

#[tokio::test]
async fn stale_library_start_does_not_override_newer_fallback() {
    let element = Arc::new(RecordingElement::without_hls());
    let provider = ScriptedProvider::new(vec![
        Obtain::Engine {
            delay: Duration::from_millis(150),
        },
        Obtain::Fail(PlaybackError::engine_load("script blocked")),
    ]);
    let session = Arc::new(session(element.clone(), provider.clone()));

    let first = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.start(STREAM_A).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = session.start(STREAM_B).await;
    let first = first.await.unwrap();

    assert!(matches!(second, StartOutcome::FallbackUsed { .. }));
    assert_eq!(first, StartOutcome::Superseded);
    // The late engine is destroyed unattached and B keeps playing directly
    assert_eq!(provider.events(), vec![Event::Destroy(1)]);
    assert_eq!(element.sources(), vec![Some(STREAM_B.to_string())]);
    assert_eq!(session.mode().await, Some(PlaybackMode::Fallback));
    assert!(!session.has_engine().await);
}

#[tokio::test]
async fn load_failure_falls_back_to_direct_source() {
    let element = Arc::new(RecordingElement::without_hls());
    let provider = ScriptedProvider::new(vec![Obtain::Fail(PlaybackError::engine_load(
        "script blocked",
    ))]);
    let session = session(element.clone(), provider);

    let outcome = session.start(STREAM_A).await;

    assert_eq!(
        outcome,
        StartOutcome::FallbackUsed {
            reason: PlaybackError::engine_load("script blocked")
        }
    );
    assert_eq!(element.sources(), vec![Some(STREAM_A.to_string())]);
    assert_eq!(element.play_count(), 1);
    assert_eq!(session.mode().await, Some(PlaybackMode::Fallback));
}

#[tokio::test]
async fn hanging_load_times_out_into_fallback() {
    let element = Arc::new(RecordingElement::without_hls());
    let provider = ScriptedProvider::new(vec![Obtain::Hang]);
    let config = PlaybackConfig {
        engine_load_timeout: Duration::from_millis(50),
        ..PlaybackConfig::default()
    };
    let session = PlaybackSession::new(element.clone(), provider, config);

    let outcome = session.start(STREAM_A).await;

    assert_eq!(
        outcome,
        StartOutcome::FallbackUsed {
            reason: PlaybackError::EngineLoadTimeout {
                timeout: Duration::from_millis(50)
            }
        }
    );
    assert_eq!(element.sources(), vec![Some(STREAM_A.to_string())]);
}

#[tokio::test]
async fn manifest_failure_moves_to_error() {
    let element = Arc::new(RecordingElement::without_hls());
    let provider = ScriptedProvider::with_manifest(
        vec![],
        Err(PlaybackError::manifest("missing #EXTM3U header")),
    );
    let session = session(element.clone(), provider.clone());

    let outcome = session.start(STREAM_A).await;

    assert_eq!(
        outcome,
        StartOutcome::Failed {
            error: PlaybackError::manifest("missing #EXTM3U header")
        }
    );
    assert_eq!(session.state().await, SessionState::Error);
    let status = session.status().await.unwrap();
    assert!(status.starts_with("Unsupported playback"));
    assert!(provider.events().contains(&Event::Destroy(1)));
    assert!(!session.has_engine().await);
    assert_eq!(element.play_count(), 0);
}

#[tokio::test]
async fn reset_releases_engine_and_clears_source() {
    let element = Arc::new(RecordingElement::without_hls());
    let provider = ScriptedProvider::new(vec![]);
    let session = session(element.clone(), provider.clone());

    session.start(STREAM_A).await;
    session.reset().await;

    assert!(provider.events().contains(&Event::Destroy(1)));
    assert_eq!(element.sources(), vec![None]);
    assert_eq!(session.state().await, SessionState::Idle);
    assert_eq!(session.current_source().await, None);
}

#[tokio::test]
async fn dropping_the_session_releases_its_engine() {
    let element = Arc::new(RecordingElement::without_hls());
    let provider = ScriptedProvider::new(vec![]);

    {
        let session = session(element, provider.clone());
        session.start(STREAM_A).await;
    }

    assert_eq!(provider.events().last(), Some(&Event::Destroy(1)));
}

struct CountingLibrary {
    loads: AtomicUsize,
    supported: bool,
    log: EventLog,
}

struct CountingFactory {
    supported: bool,
    log: EventLog,
    created: AtomicUsize,
}

impl EngineFactory for CountingFactory {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create_engine(&self) -> Box<dyn PlaybackEngine> {
        let id = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Box::new(StubEngine {
            id,
            log: Arc::clone(&self.log),
            manifest: Ok(()),
        })
    }
}

#[async_trait]
impl EngineLibrary for CountingLibrary {
    async fn load(&self) -> PlaybackResult<Arc<dyn EngineFactory>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(Arc::new(CountingFactory {
            supported: self.supported,
            log: Arc::clone(&self.log),
            created: AtomicUsize::new(0),
        }))
    }
}

#[tokio::test]
async fn engine_library_loads_once_across_sessions() {
    let library = Arc::new(CountingLibrary {
        loads: AtomicUsize::new(0),
        supported: true,
        log: Arc::default(),
    });
    let provider: Arc<dyn EngineProvider> = Arc::new(LazyEngineProvider::new(library.clone()));

    let first = session(Arc::new(RecordingElement::without_hls()), provider.clone());
    let second = session(Arc::new(RecordingElement::without_hls()), provider.clone());

    let (a, b) = tokio::join!(first.start(STREAM_A), second.start(STREAM_B));
    assert_eq!(a, StartOutcome::Playing { mode: PlaybackMode::Library });
    assert_eq!(b, StartOutcome::Playing { mode: PlaybackMode::Library });

    first.start(STREAM_B).await;
    assert_eq!(library.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unsupported_engine_falls_back() {
    let library = Arc::new(CountingLibrary {
        loads: AtomicUsize::new(0),
        supported: false,
        log: Arc::default(),
    });
    let provider = Arc::new(LazyEngineProvider::new(library));
    let element = Arc::new(RecordingElement::without_hls());
    let session = session(element.clone(), provider);

    let outcome = session.start(STREAM_A).await;
    assert_eq!(
        outcome,
        StartOutcome::FallbackUsed {
            reason: PlaybackError::EngineUnsupported
        }
    );
    assert_eq!(element.sources(), vec![Some(STREAM_A.to_string())]);
}
