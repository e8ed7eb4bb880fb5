use jlpt_core::model::{Category, Level};

use super::controller::SessionMode;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub mode: SessionMode,
    pub level: Level,
    pub category: Category,
    /// 1-based position of the current question in the queue.
    pub position: usize,
    pub queued: usize,
    pub answered: usize,
    pub correct: usize,
    pub loading: bool,
}
