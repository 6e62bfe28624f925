//! Session inspection routes.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use reelstream_common::{RecordedEvent, StreamMode};
use serde::{Deserialize, Serialize};

use super::AppContext;
use crate::streaming::SessionInfo;

pub fn session_routes() -> Router<AppContext> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/recent", get(recent_events))
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub active: usize,
    pub transcodes: usize,
    pub transcode_slots_free: usize,
    pub sessions: Vec<SessionInfo>,
}

async fn list_sessions(State(ctx): State<AppContext>) -> Json<SessionsResponse> {
    let sessions = ctx.sessions.list_active_sessions();
    Json(SessionsResponse {
        active: sessions.len(),
        transcodes: ctx.sessions.count_by_mode(StreamMode::Transcode),
        transcode_slots_free: ctx.admission.available(),
        sessions,
    })
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

async fn recent_events(
    State(ctx): State<AppContext>,
    Query(query): Query<RecentQuery>,
) -> Json<Vec<RecordedEvent>> {
    Json(ctx.events.recent(query.limit))
}
