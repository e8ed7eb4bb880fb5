use jlpt_core::model::QuizEvent;
use tracing::info;

/// Receives quiz outcome events (sound, animation, analytics hooks).
pub trait QuizObserver: Send + Sync {
    fn notify(&self, event: &QuizEvent);
}

impl<F> QuizObserver for F
where
    F: Fn(&QuizEvent) + Send + Sync,
{
    fn notify(&self, event: &QuizEvent) {
        self(event);
    }
}

/// Writes every event to the `quiz` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl QuizObserver for TracingObserver {
    fn notify(&self, event: &QuizEvent) {
        match event {
            QuizEvent::CorrectAnswer { question_id } => {
                info!(target: "quiz", question = %question_id, "correct answer");
            }
            QuizEvent::IncorrectAnswer { question_id } => {
                info!(target: "quiz", question = %question_id, "incorrect answer");
            }
            QuizEvent::MasteryAchieved { level, category } => {
                info!(target: "quiz", level = %level, category = %category, "mastery achieved");
            }
        }
    }
}
