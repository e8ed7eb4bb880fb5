use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jlpt_core::model::{
    Category, Level, ProgressState, Question, QuestionDraft, QuestionId, QuizEvent,
};
use services::{
    BatchOutcome, ProgressService, ProviderError, QuestionProvider, QuizLoopService,
    SessionController, SessionError, SessionPhase, SessionStep,
};
use storage::repository::InMemoryRepository;

fn build_question(id: &str, level: Level, category: Category) -> Question {
    QuestionDraft {
        id: Some(QuestionId::new(id)),
        level,
        category,
        text: format!("Question {id}"),
        options: vec!["one".into(), "two".into(), "three".into(), "four".into()],
        correct_index: 1,
        translation: String::new(),
        core_analysis: String::new(),
        wrong_options_analysis: String::new(),
        listening_text: None,
    }
    .validate()
    .unwrap()
}

fn vocab_batch(prefix: &str, n: usize) -> Vec<Question> {
    (0..n)
        .map(|i| build_question(&format!("{prefix}{i}"), Level::N5, Category::Vocabulary))
        .collect()
}

/// Replays queued responses and counts requests.
#[derive(Default)]
struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<Vec<Question>, ProviderError>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(responses: Vec<Result<Vec<Question>, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuestionProvider for ScriptedProvider {
    async fn request_batch(
        &self,
        _level: Level,
        _category: Category,
        _count: usize,
    ) -> Result<Vec<Question>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Unavailable("script exhausted".into())))
    }
}

struct Harness {
    quiz: QuizLoopService,
    provider: Arc<ScriptedProvider>,
    events: Arc<Mutex<Vec<QuizEvent>>>,
    repo: InMemoryRepository,
}

fn harness(responses: Vec<Result<Vec<Question>, ProviderError>>) -> Harness {
    let repo = InMemoryRepository::new();
    let provider = Arc::new(ScriptedProvider::new(responses));
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let quiz = QuizLoopService::new(
        provider.clone(),
        ProgressService::new(Arc::new(repo.clone())),
    )
    .with_observer(Arc::new(move |event: &QuizEvent| {
        sink.lock().unwrap().push(event.clone());
    }));
    Harness {
        quiz,
        provider,
        events,
        repo,
    }
}

async fn state_with_n5_score(quiz: &QuizLoopService, score: i32) -> ProgressState {
    let state = quiz.progress().load_state().await;
    let (state, _) = quiz
        .progress()
        .update_score(state, Level::FiftyOn, Category::Kana, 100)
        .await;
    let (state, _) = quiz
        .progress()
        .update_score(state, Level::N5, Category::Vocabulary, score)
        .await;
    state
}

#[tokio::test]
async fn mastery_scenario_unlocks_then_tracks_mistakes() {
    let h = harness(vec![Ok(vocab_batch("q", 2))]);
    let mut state = state_with_n5_score(&h.quiz, 90).await;
    let mut session = SessionController::new(2);

    let outcome = h
        .quiz
        .start_session(&mut session, &state, Level::N5, Category::Vocabulary)
        .await
        .unwrap();
    assert_eq!(outcome, BatchOutcome::Ready { received: 2 });

    let report = h.quiz.answer(&mut session, &mut state, 1).await.unwrap();
    assert!(report.outcome.correct);
    assert!(report.mastery_achieved());
    assert_eq!(report.unlocked(), Some(Level::N4));
    assert_eq!(state.score(Level::N5, Category::Vocabulary), 100);
    assert!(state.is_unlocked(Level::N4));
    assert!(state.wrong_questions().is_empty());

    assert_eq!(
        h.quiz.advance(&mut session, &mut state).await.unwrap(),
        SessionStep::Next
    );

    let unlocked_before = state.unlocked_levels().clone();
    let report = h.quiz.answer(&mut session, &mut state, 3).await.unwrap();
    assert!(!report.outcome.correct);
    assert!(!report.mastery_achieved());
    assert_eq!(report.unlocked(), None);
    assert_eq!(state.score(Level::N5, Category::Vocabulary), 95);
    assert_eq!(state.unlocked_levels(), &unlocked_before);
    assert_eq!(state.wrong_questions().len(), 1);
    assert_eq!(state.wrong_questions()[0].id().as_str(), "q1");

    let events = h.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            QuizEvent::CorrectAnswer {
                question_id: QuestionId::new("q0")
            },
            QuizEvent::MasteryAchieved {
                level: Level::N5,
                category: Category::Vocabulary
            },
            QuizEvent::IncorrectAnswer {
                question_id: QuestionId::new("q1")
            },
        ]
    );

    let reloaded = h.quiz.progress().load_state().await;
    assert_eq!(reloaded, state);
    assert!(h.repo.raw_progress().is_some());
}

#[tokio::test]
async fn mastery_event_fires_once_past_threshold() {
    let h = harness(vec![Ok(vocab_batch("q", 2))]);
    let mut state = state_with_n5_score(&h.quiz, 95).await;
    let mut session = SessionController::new(2);
    h.quiz
        .start_session(&mut session, &state, Level::N5, Category::Vocabulary)
        .await
        .unwrap();

    let first = h.quiz.answer(&mut session, &mut state, 1).await.unwrap();
    h.quiz.advance(&mut session, &mut state).await.unwrap();
    let second = h.quiz.answer(&mut session, &mut state, 1).await.unwrap();

    assert!(first.mastery_achieved());
    assert!(!second.mastery_achieved());
    assert_eq!(state.score(Level::N5, Category::Vocabulary), 115);
    let masteries = h
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.is_mastery())
        .count();
    assert_eq!(masteries, 1);
    assert_eq!(
        state
            .unlocked_levels()
            .iter()
            .filter(|l| **l == Level::N4)
            .count(),
        1
    );
}

#[tokio::test]
async fn exhausted_practice_queue_refills_from_provider() {
    let h = harness(vec![Ok(vocab_batch("a", 1)), Ok(vocab_batch("b", 1))]);
    let mut state = state_with_n5_score(&h.quiz, 0).await;
    let mut session = SessionController::new(1);
    h.quiz
        .start_session(&mut session, &state, Level::N5, Category::Vocabulary)
        .await
        .unwrap();

    h.quiz.answer(&mut session, &mut state, 1).await.unwrap();
    let step = h.quiz.advance(&mut session, &mut state).await.unwrap();
    assert_eq!(step, SessionStep::Refilled(BatchOutcome::Ready { received: 1 }));
    assert_eq!(h.provider.calls(), 2);
    assert_eq!(session.current_question().unwrap().id().as_str(), "b0");
}

#[tokio::test]
async fn refill_failure_aborts_session() {
    let h = harness(vec![
        Ok(vocab_batch("a", 1)),
        Err(ProviderError::Unavailable("offline".into())),
    ]);
    let mut state = state_with_n5_score(&h.quiz, 0).await;
    let mut session = SessionController::new(1);
    h.quiz
        .start_session(&mut session, &state, Level::N5, Category::Vocabulary)
        .await
        .unwrap();

    h.quiz.answer(&mut session, &mut state, 1).await.unwrap();
    let step = h.quiz.advance(&mut session, &mut state).await.unwrap();
    assert_eq!(step, SessionStep::Refilled(BatchOutcome::Aborted));
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert_eq!(state.score(Level::N5, Category::Vocabulary), 10);
}

#[tokio::test]
async fn empty_batch_leaves_session_without_question() {
    let h = harness(vec![Ok(Vec::new())]);
    let mut state = state_with_n5_score(&h.quiz, 0).await;
    let before = state.clone();
    let mut session = SessionController::new(10);

    let outcome = h
        .quiz
        .start_session(&mut session, &state, Level::N5, Category::Vocabulary)
        .await
        .unwrap();
    assert_eq!(outcome, BatchOutcome::Empty);
    assert!(!session.is_loading());
    assert!(session.current_question().is_none());

    let err = h.quiz.answer(&mut session, &mut state, 0).await.unwrap_err();
    assert_eq!(err, SessionError::NoActiveQuestion);
    assert_eq!(state, before);
    assert!(h.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn provider_failure_on_start_aborts() {
    let h = harness(vec![Err(ProviderError::Unavailable("offline".into()))]);
    let state = state_with_n5_score(&h.quiz, 0).await;
    let mut session = SessionController::new(10);

    let outcome = h
        .quiz
        .start_session(&mut session, &state, Level::N5, Category::Vocabulary)
        .await
        .unwrap();
    assert_eq!(outcome, BatchOutcome::Aborted);
    assert_eq!(session.phase(), SessionPhase::Idle);
}

#[tokio::test]
async fn locked_levels_and_foreign_categories_are_rejected() {
    let h = harness(Vec::new());
    let state = h.quiz.progress().load_state().await;
    let mut session = SessionController::default();

    let err = h
        .quiz
        .start_session(&mut session, &state, Level::N3, Category::Grammar)
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::Locked(Level::N3));

    let err = h
        .quiz
        .start_session(&mut session, &state, Level::FiftyOn, Category::Grammar)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidCategory { .. }));
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn review_session_never_refills_and_keeps_score() {
    for choice in [1, 0] {
        let h = harness(Vec::new());
        let mut state = state_with_n5_score(&h.quiz, 40).await;
        let missed = build_question("w1", Level::N5, Category::Vocabulary);
        state = h.quiz.progress().add_wrong_question(state, missed).await;

        let mut session = SessionController::default();
        h.quiz
            .start_review(&mut session, &state, &QuestionId::new("w1"))
            .unwrap();
        let report = h.quiz.answer(&mut session, &mut state, choice).await.unwrap();
        assert!(report.score.is_none());

        let step = h.quiz.advance(&mut session, &mut state).await.unwrap();
        assert_eq!(step, SessionStep::Finished);
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(h.provider.calls(), 0);
        assert_eq!(state.score(Level::N5, Category::Vocabulary), 40);

        let still_queued = state.is_wrong(&QuestionId::new("w1"));
        assert_eq!(still_queued, choice != 1);
        assert_eq!(state.wrong_questions().len(), usize::from(choice != 1));
    }
}

#[tokio::test]
async fn review_all_walks_every_missed_question_for_pair() {
    let h = harness(Vec::new());
    let mut state = state_with_n5_score(&h.quiz, 0).await;
    for id in ["w1", "w2"] {
        let q = build_question(id, Level::N5, Category::Vocabulary);
        state = h.quiz.progress().add_wrong_question(state, q).await;
    }
    let other = build_question("g1", Level::N5, Category::Grammar);
    state = h.quiz.progress().add_wrong_question(state, other).await;

    let mut session = SessionController::default();
    h.quiz
        .start_review_all(&mut session, &state, Level::N5, Category::Vocabulary)
        .unwrap();

    h.quiz.answer(&mut session, &mut state, 1).await.unwrap();
    assert_eq!(
        h.quiz.advance(&mut session, &mut state).await.unwrap(),
        SessionStep::Next
    );
    h.quiz.answer(&mut session, &mut state, 1).await.unwrap();
    assert_eq!(
        h.quiz.advance(&mut session, &mut state).await.unwrap(),
        SessionStep::Finished
    );

    let remaining: Vec<_> = state
        .wrong_questions()
        .iter()
        .map(|q| q.id().as_str())
        .collect();
    assert_eq!(remaining, vec!["g1"]);
}

#[tokio::test]
async fn review_of_unknown_question_is_rejected() {
    let h = harness(Vec::new());
    let state = h.quiz.progress().load_state().await;
    let mut session = SessionController::default();
    let err = h
        .quiz
        .start_review(&mut session, &state, &QuestionId::new("nope"))
        .unwrap_err();
    assert_eq!(err, SessionError::NotInReview(QuestionId::new("nope")));

    let err = h
        .quiz
        .start_review_all(&mut session, &state, Level::N2, Category::Grammar)
        .unwrap_err();
    assert_eq!(err, SessionError::Empty);
}
