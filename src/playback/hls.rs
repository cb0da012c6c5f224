//! Production adaptive engine
//!
//! [`HlsEngine`] follows an HLS source the way a browser-side engine does:
//! fetch the playlist, pick the highest-bandwidth variant of a master
//! playlist, then feed media segments to the element in order, re-polling
//! live playlists every target duration until destroyed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{PlaybackError, PlaybackResult};
use crate::playback::engine::{
    EngineFactory, EngineLibrary, ManifestInfo, MediaElement, PlaybackEngine, SegmentData,
    SegmentKind,
};
use crate::playback::manifest::{
    MAX_PLAYLIST_BYTES, MediaPlaylist, ParsedPlaylist, parse_media_playlist, parse_playlist,
    select_variant,
};
use crate::utils::url::UrlUtils;

/// Default timeout for playlist and segment requests
pub const DEFAULT_ENGINE_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// Bounds for re-polling live playlists
const MIN_RELOAD_INTERVAL: Duration = Duration::from_millis(500);
const MAX_RELOAD_INTERVAL: Duration = Duration::from_secs(60);

// Consecutive playlist reload failures tolerated before giving up
const MAX_RELOAD_FAILURES: u32 = 3;

/// Loads the HLS engine (builds its HTTP client)
#[derive(Debug, Clone)]
pub struct HlsEngineLibrary {
    request_timeout: Duration,
}

impl HlsEngineLibrary {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for HlsEngineLibrary {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE_REQUEST_TIMEOUT)
    }
}

#[async_trait]
impl EngineLibrary for HlsEngineLibrary {
    async fn load(&self) -> PlaybackResult<Arc<dyn EngineFactory>> {
        let client = Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| PlaybackError::engine_load(format!("HTTP client: {e}")))?;
        Ok(Arc::new(HlsEngineFactory { client }))
    }
}

pub struct HlsEngineFactory {
    client: Client,
}

impl EngineFactory for HlsEngineFactory {
    fn is_supported(&self) -> bool {
        true
    }

    fn create_engine(&self) -> Box<dyn PlaybackEngine> {
        Box::new(HlsEngine::new(self.client.clone()))
    }
}

pub struct HlsEngine {
    client: Client,
    element: Option<Arc<dyn MediaElement>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl HlsEngine {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            element: None,
            cancel: CancellationToken::new(),
            task: None,
        }
    }
}

impl PlaybackEngine for HlsEngine {
    fn attach_media(&mut self, element: Arc<dyn MediaElement>) {
        self.element = Some(element);
    }

    fn load_source(&mut self, url: &str) -> oneshot::Receiver<PlaybackResult<ManifestInfo>> {
        let (parsed_tx, parsed_rx) = oneshot::channel();

        let Some(element) = self.element.clone() else {
            let _ = parsed_tx.send(Err(PlaybackError::media("no media element attached")));
            return parsed_rx;
        };

        // A new source replaces whatever this engine was feeding
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.cancel = CancellationToken::new();

        let client = self.client.clone();
        let cancel = self.cancel.clone();
        let url = url.to_string();
        self.task = Some(tokio::spawn(async move {
            let resolved = tokio::select! {
                _ = cancel.cancelled() => return,
                resolved = resolve_manifest(&client, &url) => resolved,
            };
            match resolved {
                Ok((info, playlist)) => {
                    let media_url = info.media_playlist_url.clone();
                    let _ = parsed_tx.send(Ok(info));
                    let feeder = SegmentFeeder {
                        client,
                        element,
                        media_url,
                        cancel,
                    };
                    feeder.run(playlist).await;
                }
                Err(e) => {
                    let _ = parsed_tx.send(Err(e));
                }
            }
        }));

        parsed_rx
    }

    fn destroy(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.element = None;
    }
}

impl Drop for HlsEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Fetch the source playlist and, for a master playlist, its selected variant
async fn resolve_manifest(
    client: &Client,
    url: &str,
) -> PlaybackResult<(ManifestInfo, MediaPlaylist)> {
    let text = fetch_playlist_bounded(client, url).await?;
    let parsed = parse_playlist(&text)?;
    let kind = parsed.kind();

    let (variant_count, media_url, playlist) = match parsed {
        ParsedPlaylist::Master(variants) => {
            let variant = select_variant(&variants)
                .ok_or_else(|| PlaybackError::manifest("master playlist lists no variants"))?;
            let media_url = UrlUtils::absolutize(url, &variant.uri);
            debug!(
                "Selected variant bw={} res={:?} of {}",
                variant.bandwidth,
                variant.resolution,
                variants.len()
            );
            let media_text = fetch_playlist_bounded(client, &media_url).await?;
            (variants.len(), media_url, parse_media_playlist(&media_text)?)
        }
        ParsedPlaylist::Media(playlist) => (0, url.to_string(), playlist),
    };

    if playlist.segments.is_empty() && playlist.is_ended {
        return Err(PlaybackError::manifest("media playlist has no segments"));
    }

    let info = ManifestInfo {
        url: url.to_string(),
        kind,
        variant_count,
        media_playlist_url: media_url,
        target_duration: playlist.target_duration,
        is_live: !playlist.is_ended,
    };
    info!(
        "Manifest parsed: {} ({:?}, {} variants, live={})",
        UrlUtils::obfuscate_credentials(&info.url),
        info.kind,
        info.variant_count,
        info.is_live
    );
    Ok((info, playlist))
}

/// Fetch a playlist body, reading at most [`MAX_PLAYLIST_BYTES`]
pub async fn fetch_playlist_bounded(client: &Client, url: &str) -> PlaybackResult<String> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| PlaybackError::manifest(UrlUtils::obfuscate_credentials(&e.to_string())))?;

    if !resp.status().is_success() {
        return Err(PlaybackError::manifest(format!(
            "Non-success status: {}",
            resp.status()
        )));
    }

    // Stream body in chunks, limit total
    let mut body = resp.bytes_stream();
    let mut collected: Vec<u8> = Vec::with_capacity(8192);
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| PlaybackError::manifest(e.to_string()))?;
        if collected.len() + chunk.len() > MAX_PLAYLIST_BYTES {
            collected.extend_from_slice(&chunk[..(MAX_PLAYLIST_BYTES - collected.len())]);
            break;
        }
        collected.extend_from_slice(&chunk);
    }

    Ok(String::from_utf8_lossy(&collected).into_owned())
}

/// Feeds segments of one media playlist to the element
struct SegmentFeeder {
    client: Client,
    element: Arc<dyn MediaElement>,
    media_url: String,
    cancel: CancellationToken,
}

impl SegmentFeeder {
    async fn run(self, mut playlist: MediaPlaylist) {
        let safe_url = UrlUtils::obfuscate_credentials(&self.media_url);
        let mut last_fed: Option<u64> = None;
        let mut init_fed: Option<String> = None;
        let mut reload_failures = 0;

        loop {
            if let Some(init_uri) = playlist.init_uri.clone()
                && init_fed.as_deref() != Some(init_uri.as_str())
            {
                if !self.feed(SegmentKind::Init, &init_uri).await {
                    return;
                }
                init_fed = Some(init_uri);
            }

            for segment in &playlist.segments {
                if last_fed.is_some_and(|last| segment.sequence <= last) {
                    continue;
                }
                let kind = SegmentKind::Media {
                    sequence: segment.sequence,
                };
                if !self.feed(kind, &segment.uri).await {
                    return;
                }
                last_fed = Some(segment.sequence);
            }

            if playlist.is_ended {
                debug!("Reached end of playlist {}", safe_url);
                return;
            }

            let interval = reload_interval(playlist.target_duration);
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }

            let reloaded = fetch_playlist_bounded(&self.client, &self.media_url)
                .await
                .and_then(|text| parse_media_playlist(&text));
            match reloaded {
                Ok(next) => {
                    reload_failures = 0;
                    playlist = next;
                }
                Err(e) => {
                    reload_failures += 1;
                    warn!(
                        "Playlist reload {}/{} failed for {}: {}",
                        reload_failures, MAX_RELOAD_FAILURES, safe_url, e
                    );
                    if reload_failures >= MAX_RELOAD_FAILURES {
                        return;
                    }
                }
            }
        }
    }

    /// Fetch one segment and append it; `false` stops the feeder
    async fn feed(&self, kind: SegmentKind, uri: &str) -> bool {
        let url = UrlUtils::absolutize(&self.media_url, uri);
        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return false,
            fetched = fetch_segment(&self.client, &url) => fetched,
        };

        match fetched {
            Ok(bytes) => {
                let segment = SegmentData { kind, uri: url, bytes };
                match self.element.append_segment(segment).await {
                    Ok(()) => !self.cancel.is_cancelled(),
                    Err(e) => {
                        warn!("Element rejected segment: {}", e);
                        false
                    }
                }
            }
            // A missing segment is skipped; the next reload usually moves past it
            Err(e) => {
                warn!(
                    "Skipping segment {}: {}",
                    UrlUtils::obfuscate_credentials(&url),
                    e
                );
                !self.cancel.is_cancelled()
            }
        }
    }
}

/// Live reload delay: the target duration, kept within sane bounds
fn reload_interval(target_duration: Option<f32>) -> Duration {
    target_duration
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(|secs| Duration::from_secs_f32(secs.min(MAX_RELOAD_INTERVAL.as_secs_f32())))
        .unwrap_or(MIN_RELOAD_INTERVAL)
        .clamp(MIN_RELOAD_INTERVAL, MAX_RELOAD_INTERVAL)
}

async fn fetch_segment(client: &Client, url: &str) -> PlaybackResult<bytes::Bytes> {
    let resp = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| PlaybackError::media(UrlUtils::obfuscate_credentials(&e.to_string())))?;
    resp.bytes()
        .await
        .map_err(|e| PlaybackError::media(UrlUtils::obfuscate_credentials(&e.to_string())))
}
