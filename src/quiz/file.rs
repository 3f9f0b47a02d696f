//! Quizzes stored as `<id>.json` files in a directory

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{QuizError, QuizResult, QuizSource};
use crate::types::Quiz;

#[derive(Debug, Clone)]
pub struct FileQuizSource {
    dir: PathBuf,
}

impl FileQuizSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ids are plain file stems; anything that could escape the directory is unknown
    fn path_for(&self, quiz_id: &str) -> Option<PathBuf> {
        let safe = !quiz_id.is_empty()
            && quiz_id != "."
            && !quiz_id.contains("..")
            && !quiz_id.contains(['/', '\\', '\0']);
        safe.then(|| self.dir.join(format!("{}.json", quiz_id)))
    }
}

#[async_trait]
impl QuizSource for FileQuizSource {
    async fn get_quiz(&self, quiz_id: &str) -> QuizResult<Quiz> {
        let path = self
            .path_for(quiz_id)
            .ok_or_else(|| QuizError::NotFound(quiz_id.to_string()))?;

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(QuizError::NotFound(quiz_id.to_string()))
            }
            Err(e) => {
                tracing::error!("Failed to read quiz file {}: {}", path.display(), e);
                return Err(QuizError::Storage(e.to_string()));
            }
        };

        let mut quiz: Quiz = serde_json::from_str(&raw)
            .map_err(|e| QuizError::Invalid(format!("{}: {}", path.display(), e)))?;

        if quiz.questions.is_empty() {
            return Err(QuizError::Invalid(format!(
                "quiz {} has no questions",
                quiz_id
            )));
        }

        // The file name is authoritative for the room key
        if quiz.id != quiz_id {
            tracing::warn!(
                "Quiz file {} declares id {:?}, using {:?}",
                path.display(),
                quiz.id,
                quiz_id
            );
            quiz.id = quiz_id.to_string();
        }

        Ok(quiz)
    }
}
