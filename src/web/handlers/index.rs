//! Liveness handler

use axum::{http::StatusCode, response::Response};

use crate::web::responses::{LIVENESS_BODY, plain_text};

/// `GET /`
pub async fn liveness() -> Response {
    plain_text(StatusCode::OK, LIVENESS_BODY)
}
