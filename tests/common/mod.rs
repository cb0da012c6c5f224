//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use xtream_relay::config::Config;
use xtream_relay::errors::{PlaybackError, PlaybackResult};
use xtream_relay::playback::{MediaElement, SegmentData};
use xtream_relay::web::{AppState, WebServer, create_router};

/// Relay router behind an in-process test server
pub fn relay_server(config: Config) -> TestServer {
    let state = AppState::new(config).expect("app state");
    TestServer::new(create_router(state)).expect("test server")
}

/// Full relay server on an ephemeral local port; the token stops it
pub async fn spawn_relay(mut config: Config) -> (SocketAddr, CancellationToken) {
    config.web.host = "127.0.0.1".to_string();
    config.web.port = 0;

    let server = WebServer::new(config).expect("relay server");
    let token = CancellationToken::new();
    let (ready_tx, ready_rx) = oneshot::channel();
    tokio::spawn(server.serve_with_cancellation(ready_tx, Some(token.clone())));
    let addr = ready_rx.await.expect("ready signal").expect("relay bound");
    (addr, token)
}

/// Serve `router` on an ephemeral local port
pub async fn spawn_upstream(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind upstream");
    let addr = listener.local_addr().expect("upstream addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("upstream server");
    });
    addr
}

/// An address nothing listens on
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    addr
}

/// Media element double that records what a session does to it
#[derive(Default)]
pub struct RecordingElement {
    pub native_types: Vec<String>,
    pub reject_play: bool,
    pub sources: Mutex<Vec<Option<String>>>,
    pub segments: Mutex<Vec<SegmentData>>,
    pub plays: AtomicUsize,
}

impl RecordingElement {
    pub fn native() -> Self {
        Self {
            native_types: vec!["application/vnd.apple.mpegurl".to_string()],
            ..Self::default()
        }
    }

    pub fn without_hls() -> Self {
        Self::default()
    }

    pub fn sources(&self) -> Vec<Option<String>> {
        self.sources.lock().unwrap().clone()
    }

    pub fn segment_uris(&self) -> Vec<String> {
        self.segments
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.uri.clone())
            .collect()
    }

    pub fn play_count(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaElement for RecordingElement {
    fn can_play_type(&self, mime_type: &str) -> bool {
        self.native_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(mime_type))
    }

    fn set_source(&self, url: Option<&str>) {
        self.sources.lock().unwrap().push(url.map(str::to_string));
    }

    async fn play(&self) -> PlaybackResult<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        if self.reject_play {
            Err(PlaybackError::play_rejected("autoplay blocked"))
        } else {
            Ok(())
        }
    }

    async fn append_segment(&self, segment: SegmentData) -> PlaybackResult<()> {
        self.segments.lock().unwrap().push(segment);
        Ok(())
    }
}
