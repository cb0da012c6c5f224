//! HTTP middleware
//!
//! Cross-cutting concerns applied to every route: the permissive CORS policy
//! with pre-flight handling, and request logging.

use axum::{
    extract::Request,
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::proxy::headers::apply_cors_headers;
use crate::utils::url::UrlUtils;

/// CORS middleware
///
/// Answers every `OPTIONS` request with 200 and an empty body, and stamps the
/// CORS header set on all other responses, errors included.
pub async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        debug!("Pre-flight for {}", request.uri().path());
        let mut response = StatusCode::OK.into_response();
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

/// Request logging middleware
///
/// Logs all incoming requests with timing information. Query strings carry
/// provider credentials, so URIs are obfuscated before logging.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    // Generate request ID for tracing
    let request_id = uuid::Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = UrlUtils::obfuscate_credentials(&request.uri().to_string());

    debug!(
        method = %method,
        uri = %uri,
        request_id = %request_id,
        "HTTP request started"
    );

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let duration = start.elapsed();

    if status >= 400 {
        warn!(
            method = %method,
            uri = %uri,
            status = status,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "HTTP request completed with error"
        );
    } else {
        info!(
            method = %method,
            uri = %uri,
            status = status,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "HTTP request completed"
        );
    }

    response
}
