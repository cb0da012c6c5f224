//! Web layer
//!
//! HTTP surface of the relay: route table, shared state, middleware and the
//! server lifecycle. Handlers stay thin and delegate to [`crate::proxy`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{Router, middleware::from_fn, routing::get};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::errors::AppResult;
use crate::utils::UpstreamClient;

pub mod handlers;
pub mod middleware;
pub mod responses;

/// State shared by every handler
///
/// Immutable after startup; the pooled upstream client is the only shared
/// resource.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub upstream: UpstreamClient,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config) -> AppResult<Self> {
        let upstream = UpstreamClient::from_config(&config.upstream)?;
        Ok(Self {
            config: Arc::new(config),
            upstream,
            started_at: Instant::now(),
        })
    }
}

/// Build the relay router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Liveness and health
        .route("/", get(handlers::index::liveness))
        .route("/health", get(handlers::health::health_check))
        // Media relay
        .route("/x", get(handlers::relay::relay_media))
        .route("/xplay", get(handlers::relay::relay_live_stream))
        // Catalog relay
        .route("/xtream", get(handlers::catalog::proxy_catalog))
        // Middleware (applied in reverse order)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(middleware::cors_middleware))
        .layer(from_fn(middleware::request_logging_middleware))
        .with_state(state)
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: Config) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid listen address {}:{}",
                    config.web.host, config.web.port
                )
            })?;
        let state = AppState::new(config)?;

        Ok(Self {
            app: create_router(state),
            addr,
        })
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Serve until SIGINT/SIGTERM
    pub async fn serve(self) -> Result<()> {
        let (ready_tx, _ready_rx) = oneshot::channel();
        self.serve_with_cancellation(ready_tx, None).await
    }

    /// Serve with cancellation support and ready notification
    ///
    /// The ready signal carries the bound address (useful with port 0) or the
    /// bind failure. Without a token the server stops on SIGINT/SIGTERM.
    pub async fn serve_with_cancellation(
        self,
        ready_signal: oneshot::Sender<Result<SocketAddr>>,
        cancellation_token: Option<CancellationToken>,
    ) -> Result<()> {
        let listener = match tokio::net::TcpListener::bind(&self.addr).await {
            Ok(listener) => listener,
            Err(bind_error) => {
                let message = format!("Failed to bind to {}: {}", self.addr, bind_error);
                let _ = ready_signal.send(Err(anyhow::anyhow!("{}", message)));
                return Err(anyhow::anyhow!("{}", message));
            }
        };

        let local_addr = listener.local_addr()?;
        info!("Relay listening on http://{}", local_addr);
        let _ = ready_signal.send(Ok(local_addr));

        let shutdown_signal = async move {
            match cancellation_token {
                Some(token) => {
                    token.cancelled().await;
                    info!("Web server received cancellation signal, shutting down gracefully");
                }
                None => wait_for_shutdown_signal().await,
            }
        };

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal)
            .await?;
        Ok(())
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!("Failed to install signal handlers: {}", e);
                    return std::future::pending().await;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down gracefully"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await
            }
        }
    }
}
