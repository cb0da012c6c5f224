//! Health check handler

use axum::extract::State;

use crate::web::{AppState, responses::HealthResponse};

/// `GET /health`
///
/// The relay keeps no connections of its own to check; being able to answer
/// is the health signal.
pub async fn health_check(State(state): State<AppState>) -> HealthResponse {
    HealthResponse::healthy(state.started_at.elapsed().as_secs())
}
