use std::sync::Arc;

use jlpt_core::model::{Category, Level, ProgressState, Question, QuestionId, ScoreUpdate};
use storage::repository::ProgressRepository;
use tracing::{debug, info, warn};

/// The progress store: applies score, unlock and review-list rules and
/// persists after every mutation.
///
/// State is passed in and handed back by value; nothing is cached here.
/// Storage failures never reach the caller. A read failure behaves like an
/// empty store and a write failure is logged and dropped.
#[derive(Clone)]
pub struct ProgressService {
    repo: Arc<dyn ProgressRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(repo: Arc<dyn ProgressRepository>) -> Self {
        Self { repo }
    }

    /// Load saved progress, falling back to the default state.
    pub async fn load_state(&self) -> ProgressState {
        match self.repo.load_progress().await {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!("no saved progress, starting fresh");
                ProgressState::default()
            }
            Err(err) => {
                warn!(error = %err, "saved progress unreadable, starting fresh");
                ProgressState::default()
            }
        }
    }

    /// Apply `delta` to the pair's score and persist.
    ///
    /// The returned `ScoreUpdate` tells the caller whether this call crossed
    /// the mastery threshold and which level, if any, it unlocked.
    pub async fn update_score(
        &self,
        mut state: ProgressState,
        level: Level,
        category: Category,
        delta: i32,
    ) -> (ProgressState, ScoreUpdate) {
        let update = state.apply_score(level, category, delta);
        debug!(
            key = %update.key,
            previous = update.previous,
            current = update.current,
            "score updated"
        );
        if let Some(next) = update.unlocked {
            info!(key = %update.key, unlocked = %next, "level unlocked");
        }
        self.persist(&state).await;
        (state, update)
    }

    /// Queue a missed question for review unless its id is already queued.
    pub async fn add_wrong_question(
        &self,
        mut state: ProgressState,
        question: Question,
    ) -> ProgressState {
        let id = question.id().clone();
        if state.record_wrong(question) {
            debug!(question = %id, "added to review list");
            self.persist(&state).await;
        }
        state
    }

    /// Drop a question from the review list. Unknown ids are a no-op.
    pub async fn remove_wrong_question(
        &self,
        mut state: ProgressState,
        id: &QuestionId,
    ) -> ProgressState {
        if state.clear_wrong(id) {
            debug!(question = %id, "removed from review list");
        }
        self.persist(&state).await;
        state
    }

    async fn persist(&self, state: &ProgressState) {
        if let Err(err) = self.repo.save_progress(state).await {
            warn!(error = %err, "failed to persist progress");
        }
    }
}
