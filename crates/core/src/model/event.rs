use crate::model::ids::QuestionId;
use crate::model::level::{Category, Level};

/// Discrete outcome emitted while answering questions.
///
/// Observers (sound, animation, logging) subscribe to these instead of the
/// quiz flow calling them directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizEvent {
    CorrectAnswer { question_id: QuestionId },
    IncorrectAnswer { question_id: QuestionId },
    /// A (level, category) score reached the mastery threshold for the first time.
    MasteryAchieved { level: Level, category: Category },
}

impl QuizEvent {
    #[must_use]
    pub fn answer(question_id: QuestionId, correct: bool) -> Self {
        if correct {
            Self::CorrectAnswer { question_id }
        } else {
            Self::IncorrectAnswer { question_id }
        }
    }

    #[must_use]
    pub fn is_mastery(&self) -> bool {
        matches!(self, Self::MasteryAchieved { .. })
    }
}
