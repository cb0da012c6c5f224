//! Response types and error mapping
//!
//! Relay errors are answered with short plain-text bodies; browsers only
//! need the status. The underlying cause is logged here, once.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, error};

use crate::errors::{AppError, UpstreamKind};
use crate::proxy::headers::{TEXT_CONTENT_TYPE, apply_cors_headers};

/// Body of a failed `/x` or `/xplay` call
pub const RELAY_ERROR_BODY: &str = "Stream proxy error";

/// Body of a failed `/xtream` call
pub const CATALOG_ERROR_BODY: &str = "Proxy error";

/// Body of `GET /`
pub const LIVENESS_BODY: &str = "Xtream relay is running";

/// Plain-text response with the relay's CORS policy
pub fn plain_text(status: StatusCode, body: impl Into<String>) -> Response {
    let mut response = (status, body.into()).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(TEXT_CONTENT_TYPE),
    );
    apply_cors_headers(headers);
    response
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::InvalidRequest { message } => {
                debug!("Rejected request: {}", message);
                plain_text(StatusCode::BAD_REQUEST, message)
            }
            AppError::UpstreamUnavailable { kind, url, message } => {
                error!("Upstream {} request failed for {}: {}", kind, url, message);
                match kind {
                    UpstreamKind::Relay => plain_text(StatusCode::BAD_GATEWAY, RELAY_ERROR_BODY),
                    UpstreamKind::Catalog => {
                        plain_text(StatusCode::INTERNAL_SERVER_ERROR, CATALOG_ERROR_BODY)
                    }
                }
            }
            err @ (AppError::Configuration { .. } | AppError::Internal { .. }) => {
                error!("{}", err);
                plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

impl HealthResponse {
    pub fn healthy(uptime_seconds: u64) -> Self {
        Self {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds,
        }
    }
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn invalid_request_is_400_with_reason() {
        let response = AppError::invalid_request("Missing url").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], TEXT_CONTENT_TYPE);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(body_text(response).await, "Missing url");
    }

    #[tokio::test]
    async fn upstream_failures_map_per_surface() {
        let relay = AppError::upstream_unavailable(UpstreamKind::Relay, "http://o/a.ts", "refused")
            .into_response();
        assert_eq!(relay.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_text(relay).await, RELAY_ERROR_BODY);

        let catalog =
            AppError::upstream_unavailable(UpstreamKind::Catalog, "http://o/player_api.php", "timeout")
                .into_response();
        assert_eq!(catalog.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(catalog).await, CATALOG_ERROR_BODY);
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_details() {
        let response = AppError::internal("secret detail").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Internal server error");
    }
}
