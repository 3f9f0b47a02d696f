mod registry;

pub use registry::RoomRegistry;

use futures::{Sink, Stream};
use std::fmt::Display;
use std::sync::Arc;

use crate::config::RoomConfig;
use crate::connection::{CloseReason, Connection, Frame};
use crate::quiz::{QuizError, QuizSource};
use crate::room::RoomClosed;

/// Errors surfaced to the accept path when a connection cannot join a room
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error(transparent)]
    Quiz(#[from] QuizError),

    #[error(transparent)]
    RoomClosed(#[from] RoomClosed),
}

/// Shared application state
pub struct AppState {
    pub rooms: RoomRegistry,
    pub config: Arc<RoomConfig>,
}

impl AppState {
    pub fn new(quizzes: Arc<dyn QuizSource>, config: RoomConfig) -> Self {
        let config = Arc::new(config);
        Self {
            rooms: RoomRegistry::new(quizzes, config.clone()),
            config,
        }
    }

    /// Find or create the room and register a new connection with it.
    /// A room that shuts down between lookup and registration is retried once.
    pub async fn connect(&self, room_key: &str) -> Result<Connection, JoinError> {
        let mut last = None;
        for _ in 0..2 {
            let room = self.rooms.get_or_create(room_key).await?;
            match Connection::register(room, self.config.clone()).await {
                Ok(conn) => return Ok(conn),
                Err(closed) => {
                    tracing::debug!(room = %room_key, "Room closed during registration, retrying");
                    last = Some(closed);
                }
            }
        }
        Err(last.unwrap_or_else(|| RoomClosed(room_key.to_string())).into())
    }

    /// Entry point for the transport layer: join `room_key` over a duplex connection
    /// and serve it until it closes
    pub async fn join_room<Tx, Rx, E>(
        &self,
        room_key: &str,
        display_name: &str,
        sink: Tx,
        stream: Rx,
    ) -> Result<CloseReason, JoinError>
    where
        Tx: Sink<Frame>,
        Tx::Error: Display,
        Rx: Stream<Item = Result<Frame, E>>,
        E: Display,
    {
        let conn = self.connect(room_key).await?;
        tracing::info!(room = %room_key, conn = %conn.id(), name = %display_name, "Connection joined room");
        Ok(conn.run(sink, stream).await)
    }
}
