mod event;
mod ids;
mod level;
mod progress;
mod question;

pub use event::QuizEvent;
pub use ids::{ParseIdError, QuestionId};
pub use level::{Category, Level, ParseLevelError};
pub use progress::{
    CORRECT_POINTS, INCORRECT_POINTS, MASTERY_THRESHOLD, ProgressState, ScoreKey, ScoreKeyError,
    ScoreUpdate,
};
pub use question::{Question, QuestionDraft, QuestionError};
