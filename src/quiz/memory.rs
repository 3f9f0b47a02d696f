use async_trait::async_trait;
use std::collections::HashMap;

use super::{QuizError, QuizResult, QuizSource};
use crate::types::{Quiz, QuizId};

/// Quiz source backed by a fixed set of quizzes
#[derive(Debug, Clone, Default)]
pub struct InMemoryQuizSource {
    quizzes: HashMap<QuizId, Quiz>,
}

impl InMemoryQuizSource {
    pub fn new(quizzes: impl IntoIterator<Item = Quiz>) -> Self {
        Self {
            quizzes: quizzes.into_iter().map(|q| (q.id.clone(), q)).collect(),
        }
    }
}

#[async_trait]
impl QuizSource for InMemoryQuizSource {
    async fn get_quiz(&self, quiz_id: &str) -> QuizResult<Quiz> {
        self.quizzes
            .get(quiz_id)
            .cloned()
            .ok_or_else(|| QuizError::NotFound(quiz_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup() {
        let source = InMemoryQuizSource::new([Quiz {
            id: "q1".to_string(),
            title: "Trivia".to_string(),
            questions: vec![],
        }]);

        assert_eq!(source.get_quiz("q1").await.unwrap().title, "Trivia");
        assert_eq!(
            source.get_quiz("nope").await,
            Err(QuizError::NotFound("nope".to_string()))
        );
    }
}
