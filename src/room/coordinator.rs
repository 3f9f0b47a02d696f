use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use super::scoring;
use super::timer::QuestionTimer;
use super::{Outbound, RoomEvent};
use crate::config::RoomConfig;
use crate::protocol::{ClientMessage, PublicQuestion, ServerMessage};
use crate::types::*;

/// A registered connection as seen by the coordinator
struct Member {
    outbound: mpsc::Sender<Outbound>,
    /// Set by the first accepted `join` on this connection
    participant: Option<String>,
}

/// All mutable state of one room; only ever touched by its own task
pub(super) struct Room {
    key: RoomKey,
    quiz: Arc<Quiz>,
    config: Arc<RoomConfig>,
    phase: RoomPhase,
    question_index: Option<usize>,
    question_started_at: Option<Instant>,
    participants: HashMap<String, Participant>,
    members: HashMap<ConnectionId, Member>,
    timer: Option<QuestionTimer>,
    /// Own intake, handed to timers; weak so it does not keep the room alive
    events: mpsc::WeakSender<RoomEvent>,
    /// When the member set last became empty
    idle_since: Option<Instant>,
    created_at: String,
}

/// Display names must be non-blank, bounded and free of control characters
fn valid_name(name: &str, max_chars: usize) -> bool {
    !name.trim().is_empty()
        && name.chars().count() <= max_chars
        && !name.chars().any(char::is_control)
}

impl Room {
    pub(super) fn new(
        quiz: Quiz,
        config: Arc<RoomConfig>,
        events: mpsc::WeakSender<RoomEvent>,
    ) -> Self {
        Self {
            key: quiz.id.clone(),
            quiz: Arc::new(quiz),
            config,
            phase: RoomPhase::Waiting,
            question_index: None,
            question_started_at: None,
            participants: HashMap::new(),
            members: HashMap::new(),
            timer: None,
            events,
            idle_since: Some(Instant::now()),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Event loop: one event per wake-up until idle for too long or every handle is gone
    pub(super) async fn run(mut self, mut events: mpsc::Receiver<RoomEvent>) {
        tracing::info!(room = %self.key, title = %self.quiz.title, "Room opened");

        loop {
            let idle_deadline = self
                .idle_since
                .map(|since| since + self.config.room_idle_timeout);

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.apply(event),
                    None => break,
                },

                _ = async {
                    match idle_deadline {
                        Some(deadline) => tokio::time::sleep_until(deadline).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    if self.members.is_empty() {
                        tracing::info!(room = %self.key, "Room idle, shutting down");
                        break;
                    }
                }
            }
        }

        self.timer = None;
        tracing::info!(room = %self.key, "Room closed");
    }

    pub(super) fn apply(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::Register {
                conn,
                outbound,
                ack,
            } => self.register(conn, outbound, ack),
            RoomEvent::Unregister { conn } => self.unregister(&conn),
            RoomEvent::Client { conn, message } => self.handle_client(&conn, message),
            RoomEvent::TimerTick {
                question_index,
                remaining,
            } => {
                if self.is_live_timer(question_index) {
                    self.broadcast(&ServerMessage::Timer(remaining));
                } else {
                    tracing::debug!(room = %self.key, question_index, "Discarding stale timer tick");
                }
            }
            RoomEvent::TimerExpired { question_index } => {
                if self.is_live_timer(question_index) {
                    self.close_question();
                } else {
                    tracing::debug!(room = %self.key, question_index, "Discarding stale deadline");
                }
            }
            RoomEvent::Summary { respond_to } => {
                let _ = respond_to.send(self.summary());
            }
        }
    }

    fn register(
        &mut self,
        conn: ConnectionId,
        outbound: mpsc::Sender<Outbound>,
        ack: oneshot::Sender<()>,
    ) {
        self.members.insert(
            conn.clone(),
            Member {
                outbound,
                participant: None,
            },
        );
        self.idle_since = None;
        tracing::info!(room = %self.key, conn = %conn, connections = self.members.len(), "Connection registered");

        // The newcomer gets the current roster right away
        let roster = ServerMessage::Participants(scoring::standings(&self.participants));
        self.send_to(&conn, &roster);

        let _ = ack.send(());
    }

    fn unregister(&mut self, conn: &str) {
        let Some(member) = self.members.remove(conn) else {
            return;
        };
        tracing::info!(
            room = %self.key,
            conn = %conn,
            participant = ?member.participant,
            connections = self.members.len(),
            "Connection unregistered"
        );

        if self.members.is_empty() {
            self.idle_since = Some(Instant::now());
        }
        self.broadcast_participants();
    }

    fn handle_client(&mut self, conn: &str, message: ClientMessage) {
        match message {
            ClientMessage::Join { name } => self.join(conn, name),
            ClientMessage::Start => self.start(),
            ClientMessage::Answer { name, option_index } => self.answer(&name, option_index),
            ClientMessage::NextQuestion => self.next_question(),
        }
    }

    /// Join is accepted in every phase, including `finished`
    fn join(&mut self, conn: &str, name: String) {
        if !valid_name(&name, self.config.max_name_chars) {
            tracing::debug!(room = %self.key, "Ignoring join with invalid name");
            return;
        }
        if self.participants.contains_key(&name) {
            tracing::debug!(room = %self.key, name = %name, "Ignoring join with taken name");
            return;
        }

        if let Some(member) = self.members.get_mut(conn) {
            if member.participant.is_none() {
                member.participant = Some(name.clone());
            }
        }

        tracing::info!(room = %self.key, name = %name, "Participant joined");
        self.participants
            .insert(name.clone(), Participant::new(name));
        self.broadcast_participants();
    }

    fn start(&mut self) {
        if self.phase != RoomPhase::Waiting {
            tracing::debug!(room = %self.key, phase = %self.phase, "Ignoring start outside waiting");
            return;
        }

        if self.quiz.questions.is_empty() {
            tracing::warn!(room = %self.key, "Quiz has no questions, finishing immediately");
            self.finish();
        } else {
            self.open_question(0);
        }
    }

    fn next_question(&mut self) {
        if self.phase != RoomPhase::Leaderboard {
            tracing::debug!(room = %self.key, phase = %self.phase, "Ignoring next_question outside leaderboard");
            return;
        }

        let next = self.question_index.map_or(0, |i| i + 1);
        if next < self.quiz.questions.len() {
            self.open_question(next);
        } else {
            self.finish();
        }
    }

    /// Duplicate answers to the same question are not guarded against; each correct one scores
    fn answer(&mut self, name: &str, option_index: usize) {
        if self.phase != RoomPhase::Question {
            tracing::debug!(room = %self.key, "Ignoring answer outside question phase");
            return;
        }

        let (Some(index), Some(started_at)) = (self.question_index, self.question_started_at)
        else {
            return;
        };
        let Some(option) = self
            .quiz
            .question(index)
            .and_then(|q| q.options.get(option_index))
        else {
            tracing::debug!(room = %self.key, option_index, "Ignoring answer with out-of-range option");
            return;
        };
        let Some(participant) = self.participants.get_mut(name) else {
            tracing::debug!(room = %self.key, name = %name, "Ignoring answer from unknown participant");
            return;
        };

        if option.is_correct {
            let points = scoring::points_for(started_at.elapsed());
            participant.score = participant.score.saturating_add(points);
            tracing::debug!(room = %self.key, name = %name, points, total = participant.score, "Correct answer");
        }
    }

    fn open_question(&mut self, index: usize) {
        let Some(question) = self.quiz.question(index) else {
            return;
        };
        let public = PublicQuestion::from(question);

        self.phase = RoomPhase::Question;
        self.question_index = Some(index);
        self.question_started_at = Some(Instant::now());
        tracing::info!(room = %self.key, question_index = index, "Question opened");

        self.broadcast(&ServerMessage::Question(public));

        // Replacing the handle cancels the previous countdown
        self.timer = Some(QuestionTimer::start(
            index,
            self.config.question_duration,
            self.config.tick_interval,
            self.events.clone(),
        ));
    }

    fn close_question(&mut self) {
        self.timer = None;
        self.phase = RoomPhase::Leaderboard;
        tracing::info!(room = %self.key, question_index = ?self.question_index, "Question closed");

        self.broadcast(&ServerMessage::Leaderboard(scoring::standings(
            &self.participants,
        )));
    }

    fn finish(&mut self) {
        self.timer = None;
        self.phase = RoomPhase::Finished;
        tracing::info!(room = %self.key, participants = self.participants.len(), "Quiz finished");

        let standings = scoring::standings(&self.participants);
        self.broadcast(&ServerMessage::Leaderboard(standings.clone()));
        self.broadcast(&ServerMessage::QuizEnd(standings));
    }

    /// A timer event counts only if it belongs to the question currently open
    fn is_live_timer(&self, question_index: usize) -> bool {
        self.phase == RoomPhase::Question
            && self.question_index == Some(question_index)
            && self
                .timer
                .as_ref()
                .is_some_and(|t| t.question_index() == question_index)
    }

    fn broadcast_participants(&self) {
        self.broadcast(&ServerMessage::Participants(scoring::standings(
            &self.participants,
        )));
    }

    fn encode(&self, message: &ServerMessage) -> Option<Outbound> {
        match serde_json::to_string(message) {
            Ok(json) => Some(json.into()),
            Err(e) => {
                tracing::error!(room = %self.key, "Failed to encode broadcast: {}", e);
                None
            }
        }
    }

    /// Best-effort fan-out: a full queue loses this message for that connection only
    fn broadcast(&self, message: &ServerMessage) {
        let Some(frame) = self.encode(message) else {
            return;
        };

        for (conn, member) in &self.members {
            push(&self.key, conn, member, frame.clone());
        }
    }

    fn send_to(&self, conn: &str, message: &ServerMessage) {
        if let (Some(member), Some(frame)) = (self.members.get(conn), self.encode(message)) {
            push(&self.key, conn, member, frame);
        }
    }

    fn summary(&self) -> RoomSummary {
        RoomSummary {
            key: self.key.clone(),
            title: self.quiz.title.clone(),
            phase: self.phase,
            question_index: self.question_index.map_or(-1, |i| i as i64),
            question_count: self.quiz.questions.len(),
            participants: self.participants.len(),
            connections: self.members.len(),
            created_at: self.created_at.clone(),
        }
    }
}

fn push(key: &str, conn: &str, member: &Member, frame: Outbound) {
    match member.outbound.try_send(frame) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::debug!(room = %key, conn = %conn, "Outbound queue full, dropping message");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            // Its connection actor is tearing down and will unregister
            tracing::trace!(room = %key, conn = %conn, "Outbound queue closed");
        }
    }
}
