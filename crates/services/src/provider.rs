use async_trait::async_trait;

use jlpt_core::model::{Category, Level, Question};

use crate::error::ProviderError;

/// Source of fresh quiz questions.
///
/// Implementations should return questions whose correct index lies within
/// their options; the session does not re-check beyond rejecting answers
/// outside the option range.
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    /// Request up to `count` questions for the pair.
    ///
    /// An empty batch is a valid answer.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` when the request is rejected or fails.
    async fn request_batch(
        &self,
        level: Level,
        category: Category,
        count: usize,
    ) -> Result<Vec<Question>, ProviderError>;
}
