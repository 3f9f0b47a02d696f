//! Process-wide map from room key to room coordinator

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

use crate::config::RoomConfig;
use crate::quiz::{QuizError, QuizResult, QuizSource};
use crate::room::RoomHandle;
use crate::types::RoomKey;

type Slot = Arc<OnceCell<RoomHandle>>;

/// Lookup-or-create is atomic per key: concurrent first joins share one
/// coordinator and one quiz fetch. Rooms that shut down are replaced on the
/// next lookup.
pub struct RoomRegistry {
    rooms: Mutex<HashMap<RoomKey, Slot>>,
    quizzes: Arc<dyn QuizSource>,
    config: Arc<RoomConfig>,
}

impl RoomRegistry {
    pub fn new(quizzes: Arc<dyn QuizSource>, config: Arc<RoomConfig>) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            quizzes,
            config,
        }
    }

    async fn slot(&self, key: &str) -> Slot {
        self.rooms
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Drop `slot` from the map unless it was already replaced
    async fn forget(&self, key: &str, slot: &Slot) {
        let mut rooms = self.rooms.lock().await;
        if rooms.get(key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            rooms.remove(key);
        }
    }

    /// Return the live room for `key`, creating it (and loading its quiz) if needed
    pub async fn get_or_create(&self, key: &str) -> QuizResult<RoomHandle> {
        loop {
            let slot = self.slot(key).await;

            let created = slot
                .get_or_try_init(|| async {
                    let quiz = self.quizzes.get_quiz(key).await?;
                    tracing::info!(room = %key, questions = quiz.questions.len(), "Creating room");
                    Ok::<_, QuizError>(RoomHandle::spawn(quiz, self.config.clone()))
                })
                .await;

            match created {
                Ok(handle) if !handle.is_closed() => return Ok(handle.clone()),
                Ok(_) => {
                    tracing::debug!(room = %key, "Replacing closed room");
                    self.forget(key, &slot).await;
                }
                Err(e) => {
                    tracing::warn!(room = %key, "Quiz lookup failed: {}", e);
                    if !slot.initialized() {
                        self.forget(key, &slot).await;
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Existing live room, without creating one
    pub async fn get(&self, key: &str) -> Option<RoomHandle> {
        let rooms = self.rooms.lock().await;
        rooms
            .get(key)
            .and_then(|slot| slot.get())
            .filter(|handle| !handle.is_closed())
            .cloned()
    }

    /// All live rooms, sorted by key; closed ones are pruned on the way
    pub async fn rooms(&self) -> Vec<RoomHandle> {
        let mut rooms = self.rooms.lock().await;
        rooms.retain(|_, slot| slot.get().map_or(true, |handle| !handle.is_closed()));

        let mut live: Vec<RoomHandle> = rooms.values().filter_map(|slot| slot.get()).cloned().collect();
        live.sort_by(|a, b| a.key().cmp(b.key()));
        live
    }
}
