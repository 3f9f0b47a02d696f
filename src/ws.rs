use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;

use crate::connection::Frame;
use crate::quiz::QuizError;
use crate::state::{AppState, JoinError};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub name: Option<String>,
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Ping(data) => Message::Ping(data.into()),
            Frame::Pong(data) => Message::Pong(data.into()),
            Frame::Close => Message::Close(None),
        }
    }
}

/// Map a transport message onto a frame; binary payloads are not part of the protocol
fn to_frame(message: Message) -> Option<Frame> {
    match message {
        Message::Text(text) => Some(Frame::Text(text.to_string())),
        Message::Ping(data) => Some(Frame::Ping(data.to_vec())),
        Message::Pong(data) => Some(Frame::Pong(data.to_vec())),
        Message::Close(_) => Some(Frame::Close),
        Message::Binary(_) => None,
    }
}

fn quiz_error_response(err: &QuizError) -> Response {
    match err {
        QuizError::NotFound(_) => (StatusCode::NOT_FOUND, "Quiz not found").into_response(),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response(),
    }
}

/// WebSocket upgrade handler for `/ws/quiz/{id}/join`
///
/// The room (and its quiz) is resolved before upgrading so lookup failures reach
/// the client as plain HTTP errors.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(quiz_id): Path<String>,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let name = params.name.unwrap_or_default();
    tracing::info!("WebSocket connection request: quiz={}, name={:?}", quiz_id, name);

    if let Err(e) = state.rooms.get_or_create(&quiz_id).await {
        return quiz_error_response(&e);
    }

    ws.max_message_size(state.config.max_frame_bytes)
        .on_upgrade(move |socket| handle_socket(socket, quiz_id, name, state))
}

async fn handle_socket(socket: WebSocket, quiz_id: String, name: String, state: Arc<AppState>) {
    let (sender, receiver) = socket.split();
    let sink = sender.with(|frame: Frame| async move { Ok::<_, axum::Error>(Message::from(frame)) });
    let stream = receiver.filter_map(|message| async move {
        match message {
            Ok(message) => to_frame(message).map(Ok),
            Err(e) => Some(Err(e)),
        }
    });

    match state.join_room(&quiz_id, &name, sink, stream).await {
        Ok(reason) => tracing::debug!("WebSocket for {} finished: {:?}", quiz_id, reason),
        Err(JoinError::Quiz(e)) => tracing::warn!("Quiz {} unavailable after upgrade: {}", quiz_id, e),
        Err(e) => tracing::error!("Failed to join room {}: {}", quiz_id, e),
    }
}
