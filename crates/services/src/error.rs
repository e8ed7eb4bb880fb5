//! Shared error types for the services crate.

use thiserror::Error;

use jlpt_core::model::{Category, Level, QuestionError, QuestionId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors reported by a `QuestionProvider`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("question provider unavailable: {0}")]
    Unavailable(String),
    #[error("question provider returned malformed data: {0}")]
    Malformed(String),
}

/// Errors emitted while loading a question bank.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BankError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid bank question #{index}: {source}")]
    Question {
        index: usize,
        #[source]
        source: QuestionError,
    },
}

/// Errors emitted by quiz sessions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no active session")]
    NoSession,
    #[error("session is waiting for questions")]
    Loading,
    #[error("no question to answer")]
    NoActiveQuestion,
    #[error("current question already answered")]
    AlreadyAnswered,
    #[error("current question not answered yet")]
    NotAnswered,
    #[error("choice {choice} out of range for {options} options")]
    InvalidChoice { choice: usize, options: usize },
    #[error("no questions available for session")]
    Empty,
    #[error("level {0} is locked")]
    Locked(Level),
    #[error("category {category} is not offered at level {level}")]
    InvalidCategory { level: Level, category: Category },
    #[error("question {0} is not in the review list")]
    NotInReview(QuestionId),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Bank(#[from] BankError),
}
