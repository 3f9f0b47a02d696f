//! Room coordinator
//!
//! Each room is a single task that owns all game state for one quiz session.
//! Everything else talks to it through a [`RoomHandle`], which only sends
//! [`RoomEvent`]s into the room's intake queue. Events are applied one at a
//! time in arrival order, so score updates, phase transitions and broadcasts
//! never interleave.

mod coordinator;
pub mod scoring;
mod timer;

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::config::RoomConfig;
use crate::protocol::ClientMessage;
use crate::types::{ConnectionId, Quiz, RoomKey, RoomSummary};

use coordinator::Room;

/// Pre-serialized frame queued for one connection
pub type Outbound = Arc<str>;

/// The room's coordinator has stopped and no longer accepts events
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("Room {0} is closed")]
pub struct RoomClosed(pub RoomKey);

/// Everything a room coordinator reacts to
#[derive(Debug)]
pub enum RoomEvent {
    Register {
        conn: ConnectionId,
        outbound: mpsc::Sender<Outbound>,
        ack: oneshot::Sender<()>,
    },
    Unregister {
        conn: ConnectionId,
    },
    Client {
        conn: ConnectionId,
        message: ClientMessage,
    },
    TimerTick {
        question_index: usize,
        remaining: u64,
    },
    TimerExpired {
        question_index: usize,
    },
    Summary {
        respond_to: oneshot::Sender<RoomSummary>,
    },
}

/// Cloneable handle to a running room coordinator
#[derive(Debug, Clone)]
pub struct RoomHandle {
    key: RoomKey,
    events: mpsc::Sender<RoomEvent>,
}

impl RoomHandle {
    /// Spawn the coordinator task for `quiz` and return a handle to it
    pub fn spawn(quiz: Quiz, config: Arc<RoomConfig>) -> Self {
        let (tx, rx) = mpsc::channel(config.event_capacity);
        let key = quiz.id.clone();
        let room = Room::new(quiz, config, tx.downgrade());

        tokio::spawn(room.run(rx));

        Self { key, events: tx }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// True once the coordinator has exited
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }

    pub fn same_room(&self, other: &RoomHandle) -> bool {
        self.events.same_channel(&other.events)
    }

    async fn send(&self, event: RoomEvent) -> Result<(), RoomClosed> {
        self.events
            .send(event)
            .await
            .map_err(|_| RoomClosed(self.key.clone()))
    }

    /// Add a connection to the broadcast set; resolves once the coordinator has applied it
    pub async fn register(
        &self,
        conn: ConnectionId,
        outbound: mpsc::Sender<Outbound>,
    ) -> Result<(), RoomClosed> {
        let (ack, done) = oneshot::channel();
        self.send(RoomEvent::Register {
            conn,
            outbound,
            ack,
        })
        .await?;
        done.await.map_err(|_| RoomClosed(self.key.clone()))
    }

    pub async fn unregister(&self, conn: ConnectionId) {
        // A closed room has already forgotten the connection
        let _ = self.send(RoomEvent::Unregister { conn }).await;
    }

    /// Forward a decoded client event
    pub async fn dispatch(
        &self,
        conn: ConnectionId,
        message: ClientMessage,
    ) -> Result<(), RoomClosed> {
        self.send(RoomEvent::Client { conn, message }).await
    }

    pub async fn summary(&self) -> Result<RoomSummary, RoomClosed> {
        let (respond_to, rx) = oneshot::channel();
        self.send(RoomEvent::Summary { respond_to }).await?;
        rx.await.map_err(|_| RoomClosed(self.key.clone()))
    }
}
