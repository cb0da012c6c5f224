//! Media relay handlers (`/x`, `/xplay`)

use axum::{
    extract::{Query, State},
    http::{HeaderMap, header},
    response::Response,
};
use serde::Deserialize;

use crate::errors::AppResult;
use crate::proxy::{LiveStreamParams, RelayRequest, relay_stream};
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct RelayQuery {
    pub url: Option<String>,
}

/// Query of `/xplay`; long parameter names are accepted as aliases
#[derive(Debug, Deserialize)]
pub struct LiveStreamQuery {
    pub host: Option<String>,
    #[serde(alias = "username")]
    pub u: Option<String>,
    #[serde(alias = "password")]
    pub p: Option<String>,
    pub stream: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl From<LiveStreamQuery> for LiveStreamParams {
    fn from(query: LiveStreamQuery) -> Self {
        Self {
            host: query.host,
            username: query.u,
            password: query.p,
            stream_id: query.stream,
            kind: query.kind,
        }
    }
}

/// `GET /x?url=<absolute url>`
pub async fn relay_media(
    State(state): State<AppState>,
    Query(query): Query<RelayQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let request = RelayRequest::from_headers(query.url.as_deref(), &headers)?;
    relay_stream(&state.upstream, request, &state.config.relay).await
}

/// `GET /xplay?host=&u=&p=&stream=&type=`
pub async fn relay_live_stream(
    State(state): State<AppState>,
    Query(query): Query<LiveStreamQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let params = LiveStreamParams::from(query);
    let request = RelayRequest::live_stream(&params, headers.get(header::RANGE))?;
    relay_stream(&state.upstream, request, &state.config.relay).await
}
