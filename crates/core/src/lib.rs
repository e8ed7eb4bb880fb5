#![forbid(unsafe_code)]

pub mod model;

pub use model::{Category, Level, ProgressState, Question, QuestionId, QuizEvent};

/// Questions requested per provider call.
pub const DEFAULT_BATCH_SIZE: usize = 10;
