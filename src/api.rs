//! Read-only HTTP endpoints for inspecting live rooms.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::state::AppState;
use crate::types::RoomSummary;

/// List live rooms.
///
/// GET /api/rooms
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummary>> {
    let handles = state.rooms.rooms().await;
    let summaries = futures::future::join_all(handles.iter().map(|room| room.summary())).await;

    // A room that closed mid-request is simply left out
    Json(summaries.into_iter().filter_map(Result::ok).collect())
}

/// Inspect a single room.
///
/// GET /api/rooms/{key}
pub async fn get_room(Path(key): Path<String>, State(state): State<Arc<AppState>>) -> Response {
    let Some(room) = state.rooms.get(&key).await else {
        return (StatusCode::NOT_FOUND, "Room not found").into_response();
    };

    match room.summary().await {
        Ok(summary) => Json(summary).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Room not found").into_response(),
    }
}
