mod file;
mod memory;

use async_trait::async_trait;

use crate::types::{Quiz, QuizId};

pub use file::FileQuizSource;
pub use memory::InMemoryQuizSource;

/// Result type for quiz lookups
pub type QuizResult<T> = Result<T, QuizError>;

/// Errors that can occur while fetching a quiz
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum QuizError {
    #[error("Quiz not found: {0}")]
    NotFound(QuizId),

    #[error("Quiz storage failure: {0}")]
    Storage(String),

    #[error("Quiz is malformed: {0}")]
    Invalid(String),
}

/// Supplies the immutable quiz a room is built from
#[async_trait]
pub trait QuizSource: Send + Sync {
    async fn get_quiz(&self, quiz_id: &str) -> QuizResult<Quiz>;
}
