use std::sync::Arc;

use jlpt_core::model::{
    CORRECT_POINTS, Category, INCORRECT_POINTS, Level, ProgressState, QuestionId, QuizEvent,
    ScoreUpdate,
};
use tracing::{info, warn};

use super::controller::{AdvanceStep, AnswerOutcome, BatchOutcome, SessionController, SessionMode};
use crate::error::SessionError;
use crate::observer::QuizObserver;
use crate::progress_service::ProgressService;
use crate::provider::QuestionProvider;

/// Result of answering the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerReport {
    pub outcome: AnswerOutcome,
    /// Score change, present for practice answers only.
    pub score: Option<ScoreUpdate>,
}

impl AnswerReport {
    #[must_use]
    pub fn mastery_achieved(&self) -> bool {
        self.score.is_some_and(|s| s.mastery_achieved())
    }

    #[must_use]
    pub fn unlocked(&self) -> Option<Level> {
        self.score.and_then(|s| s.unlocked)
    }
}

/// Result of moving to the next question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    Next,
    Finished,
    /// A refill was requested; the outcome says whether the session goes on.
    Refilled(BatchOutcome),
}

/// Orchestrates a session controller, the question provider and the
/// progress store.
#[derive(Clone)]
pub struct QuizLoopService {
    provider: Arc<dyn QuestionProvider>,
    progress: ProgressService,
    observers: Vec<Arc<dyn QuizObserver>>,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(provider: Arc<dyn QuestionProvider>, progress: ProgressService) -> Self {
        Self {
            provider,
            progress,
            observers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn QuizObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressService {
        &self.progress
    }

    fn emit(&self, event: &QuizEvent) {
        for observer in &self.observers {
            observer.notify(event);
        }
    }

    /// Start a practice session and wait for its first batch.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Locked` for a locked level and
    /// `SessionError::InvalidCategory` for a category the level does not
    /// offer. Provider failures are reported as `BatchOutcome::Aborted`.
    pub async fn start_session(
        &self,
        session: &mut SessionController,
        state: &ProgressState,
        level: Level,
        category: Category,
    ) -> Result<BatchOutcome, SessionError> {
        if !level.allows(category) {
            return Err(SessionError::InvalidCategory { level, category });
        }
        if !state.is_unlocked(level) {
            return Err(SessionError::Locked(level));
        }

        let ticket = session.start(level, category);
        let result = self
            .provider
            .request_batch(ticket.level(), ticket.category(), ticket.count())
            .await;
        if let Err(err) = &result {
            warn!(%level, %category, error = %err, "question batch request failed");
        }
        Ok(session.receive_batch(ticket, result))
    }

    /// Start a review session over one missed question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotInReview` if `id` is not in the wrong list.
    pub fn start_review(
        &self,
        session: &mut SessionController,
        state: &ProgressState,
        id: &QuestionId,
    ) -> Result<(), SessionError> {
        let question = state
            .wrong_questions()
            .iter()
            .find(|q| q.id() == id)
            .cloned()
            .ok_or_else(|| SessionError::NotInReview(id.clone()))?;
        session.start_review(question.level(), question.category(), vec![question])?;
        Ok(())
    }

    /// Start a review session over every missed question for the pair.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if there is nothing to review.
    pub fn start_review_all(
        &self,
        session: &mut SessionController,
        state: &ProgressState,
        level: Level,
        category: Category,
    ) -> Result<(), SessionError> {
        let questions = state.wrong_questions_for(level, category).cloned().collect();
        session.start_review(level, category, questions)?;
        Ok(())
    }

    /// Answer the current question and apply its side effects.
    ///
    /// A wrong answer is queued for review. Practice answers move the
    /// session's score by +10 or -5.
    ///
    /// # Errors
    ///
    /// Propagates `SessionError` from the controller; `state` is untouched
    /// in that case.
    pub async fn answer(
        &self,
        session: &mut SessionController,
        state: &mut ProgressState,
        choice: usize,
    ) -> Result<AnswerReport, SessionError> {
        let outcome = session.submit_answer(choice)?;
        self.emit(&QuizEvent::answer(
            outcome.question.id().clone(),
            outcome.correct,
        ));

        if !outcome.correct {
            *state = self
                .progress
                .add_wrong_question(std::mem::take(state), outcome.question.clone())
                .await;
        }

        let mut score = None;
        if outcome.mode == SessionMode::Practice {
            let delta = if outcome.correct {
                CORRECT_POINTS
            } else {
                INCORRECT_POINTS
            };
            let (updated, update) = self
                .progress
                .update_score(std::mem::take(state), outcome.level, outcome.category, delta)
                .await;
            *state = updated;
            if update.mastery_achieved() {
                info!(level = %outcome.level, category = %outcome.category, "mastery achieved");
                self.emit(&QuizEvent::MasteryAchieved {
                    level: outcome.level,
                    category: outcome.category,
                });
            }
            score = Some(update);
        }

        Ok(AnswerReport { outcome, score })
    }

    /// Move past the answered question, refilling practice sessions.
    ///
    /// A correctly answered review question leaves the wrong list here.
    ///
    /// # Errors
    ///
    /// Propagates `SessionError` from the controller.
    pub async fn advance(
        &self,
        session: &mut SessionController,
        state: &mut ProgressState,
    ) -> Result<SessionStep, SessionError> {
        let cleared = match (session.mode(), session.last_answer()) {
            (Some(SessionMode::Review), Some(answer)) if answer.correct => {
                Some(answer.question_id.clone())
            }
            _ => None,
        };

        let step = session.advance()?;

        if let Some(id) = cleared {
            *state = self
                .progress
                .remove_wrong_question(std::mem::take(state), &id)
                .await;
        }

        match step {
            AdvanceStep::Next => Ok(SessionStep::Next),
            AdvanceStep::Finished => Ok(SessionStep::Finished),
            AdvanceStep::Refill(ticket) => {
                let result = self
                    .provider
                    .request_batch(ticket.level(), ticket.category(), ticket.count())
                    .await;
                if let Err(err) = &result {
                    warn!(level = %ticket.level(), category = %ticket.category(), error = %err, "refill request failed");
                }
                Ok(SessionStep::Refilled(session.receive_batch(ticket, result)))
            }
        }
    }
}
