// Public API for integration tests and potential library usage

pub mod api;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod quiz;
pub mod room;
pub mod state;
pub mod types;
pub mod ws;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::state::AppState;

/// HTTP surface: the realtime join endpoint plus room introspection
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws/quiz/{id}/join", get(ws::ws_handler))
        .route("/api/rooms", get(api::list_rooms))
        .route("/api/rooms/{key}", get(api::get_room))
        .with_state(state)
}
