use serde::{Deserialize, Serialize};

/// Opaque ID types for readability
pub type QuizId = String;
pub type QuestionId = String;
pub type OptionId = String;
/// Rooms are keyed by the quiz they play
pub type RoomKey = QuizId;
pub type ConnectionId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizOption {
    pub id: OptionId,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<QuizOption>,
}

/// Immutable quiz snapshot, loaded once when a room is created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quiz {
    pub id: QuizId,
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub name: String,
    pub score: u32,
}

impl Participant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            score: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomPhase {
    Waiting,
    Question,
    Leaderboard,
    Finished,
}

impl std::fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RoomPhase::Waiting => "waiting",
            RoomPhase::Question => "question",
            RoomPhase::Leaderboard => "leaderboard",
            RoomPhase::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a room, computed by its coordinator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub key: RoomKey,
    pub title: String,
    pub phase: RoomPhase,
    /// -1 before the first question
    pub question_index: i64,
    pub question_count: usize,
    pub participants: usize,
    pub connections: usize,
    /// ISO timestamp of room creation
    pub created_at: String,
}
