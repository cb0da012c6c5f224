//! Catalog relay handler (`/xtream`)

use axum::{
    extract::{Query, State},
    response::Response,
};

use crate::errors::AppResult;
use crate::proxy::{CatalogRequest, fetch_catalog};
use crate::web::AppState;

/// `GET /xtream?host=&endpoint=&action=&...`
///
/// The query is taken as ordered pairs so passthrough parameters reach the
/// provider in the order the browser sent them.
pub async fn proxy_catalog(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<Response> {
    let request = CatalogRequest::from_query_pairs(pairs)?;
    fetch_catalog(&state.upstream, request, &state.config.catalog).await
}
