//! Connection actor
//!
//! Bridges one duplex transport to a room. The transport is any `futures`
//! stream of inbound [`Frame`]s plus a sink for outbound ones, so the same code
//! runs over an axum WebSocket or an in-memory channel.

use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::RoomConfig;
use crate::protocol::ClientMessage;
use crate::room::{Outbound, RoomClosed, RoomHandle};
use crate::types::ConnectionId;

/// Transport-level frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

/// Why a connection actor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer sent a close frame or ended the stream
    PeerClosed,
    IdleTimeout,
    ReadFailed,
    WriteFailed,
    /// The room dropped our outbound queue
    QueueClosed,
    RoomClosed,
}

/// A connection that the room already knows about
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    room: RoomHandle,
    outbound: mpsc::Receiver<Outbound>,
    config: Arc<RoomConfig>,
}

impl Connection {
    /// Register with the room before any loop runs, so no broadcast can race the registration
    pub async fn register(room: RoomHandle, config: Arc<RoomConfig>) -> Result<Self, RoomClosed> {
        let id = ulid::Ulid::new().to_string();
        let (tx, rx) = mpsc::channel(config.outbound_capacity);
        room.register(id.clone(), tx).await?;

        Ok(Self {
            id,
            room,
            outbound: rx,
            config,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Drive both directions until either side stops, then unregister
    pub async fn run<Tx, Rx, E>(self, sink: Tx, stream: Rx) -> CloseReason
    where
        Tx: Sink<Frame>,
        Tx::Error: Display,
        Rx: Stream<Item = Result<Frame, E>>,
        E: Display,
    {
        let Connection {
            id,
            room,
            mut outbound,
            config,
        } = self;

        let reason = tokio::select! {
            reason = read_loop(&room, &id, stream, config.idle_timeout) => reason,
            reason = write_loop(
                &mut outbound,
                sink,
                config.write_timeout,
                config.ping_interval(),
            ) => reason,
        };

        tracing::info!(room = %room.key(), conn = %id, ?reason, "Connection closed");
        room.unregister(id).await;
        reason
    }
}

async fn read_loop<Rx, E>(
    room: &RoomHandle,
    conn: &str,
    stream: Rx,
    idle_timeout: Duration,
) -> CloseReason
where
    Rx: Stream<Item = Result<Frame, E>>,
    E: Display,
{
    let mut stream = std::pin::pin!(stream);

    loop {
        let next = match tokio::time::timeout(idle_timeout, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                tracing::debug!(conn = %conn, "Idle timeout");
                return CloseReason::IdleTimeout;
            }
        };

        match next {
            Some(Ok(Frame::Text(text))) => match ClientMessage::decode(&text) {
                Ok(message) => {
                    if room.dispatch(conn.to_string(), message).await.is_err() {
                        return CloseReason::RoomClosed;
                    }
                }
                // Malformed events are dropped without a reply
                Err(e) => tracing::debug!(conn = %conn, "Dropping malformed event: {}", e),
            },
            Some(Ok(Frame::Ping(_))) | Some(Ok(Frame::Pong(_))) => {}
            Some(Ok(Frame::Close)) | None => return CloseReason::PeerClosed,
            Some(Err(e)) => {
                tracing::warn!(conn = %conn, "Read failed: {}", e);
                return CloseReason::ReadFailed;
            }
        }
    }
}

async fn write_loop<Tx>(
    outbound: &mut mpsc::Receiver<Outbound>,
    sink: Tx,
    write_timeout: Duration,
    ping_interval: Duration,
) -> CloseReason
where
    Tx: Sink<Frame>,
    Tx::Error: Display,
{
    let mut sink = std::pin::pin!(sink);
    let mut ping = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);

    loop {
        let frame = tokio::select! {
            next = outbound.recv() => match next {
                Some(text) => Frame::Text(text.to_string()),
                None => {
                    let _ = sink.close().await;
                    return CloseReason::QueueClosed;
                }
            },
            _ = ping.tick() => Frame::Ping(Vec::new()),
        };

        match tokio::time::timeout(write_timeout, sink.send(frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!("Write failed: {}", e);
                return CloseReason::WriteFailed;
            }
            Err(_) => {
                tracing::warn!("Write timed out after {:?}", write_timeout);
                return CloseReason::WriteFailed;
            }
        }
    }
}
