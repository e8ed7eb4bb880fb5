use std::fmt;

use jlpt_core::DEFAULT_BATCH_SIZE;
use jlpt_core::model::{Category, Level, Question, QuestionId};
use tracing::debug;

use super::progress::SessionProgress;
use crate::error::{ProviderError, SessionError};

//
// ─── IDENTIFIERS & TICKETS ─────────────────────────────────────────────────────
//

/// Generation number of a session; bumps on every start.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Fresh questions from the provider; answers move the score.
    Practice,
    /// Previously missed questions; no score change, no refills.
    Review,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Initial,
    Refill,
}

/// An outstanding provider request.
///
/// Hand the provider's result back through `SessionController::receive_batch`
/// together with this ticket. Only the most recent request of the current
/// session is accepted; anything else is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTicket {
    session_id: SessionId,
    request: u64,
    kind: BatchKind,
    level: Level,
    category: Category,
    count: usize,
}

impl BatchTicket {
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Per-session sequence number of this request, starting at 1.
    #[must_use]
    pub fn request(&self) -> u64 {
        self.request
    }

    #[must_use]
    pub fn kind(&self) -> BatchKind {
        self.kind
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }
}

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Loading,
    Active { answered: bool },
}

/// What happened to a delivered batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Questions were queued and the session has a current question.
    Ready { received: usize },
    /// The provider returned nothing; the session stalls with no question.
    Empty,
    /// The provider failed; the session was ended.
    Aborted,
    /// The ticket no longer matches a loading session; result dropped.
    Discarded,
}

/// Result of moving past an answered question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceStep {
    Next,
    /// Queue exhausted in practice mode; fetch another batch.
    Refill(BatchTicket),
    /// Queue exhausted in review mode; the session is over.
    Finished,
}

/// The answer recorded for the current question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub choice: usize,
    pub correct: bool,
}

/// Returned by `submit_answer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub question: Question,
    pub choice: usize,
    pub correct: bool,
    pub mode: SessionMode,
    pub level: Level,
    pub category: Category,
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

struct ActiveSession {
    id: SessionId,
    level: Level,
    category: Category,
    mode: SessionMode,
    queue: Vec<Question>,
    index: usize,
    answer: Option<AnswerRecord>,
    loading: Option<PendingBatch>,
    requests: u64,
    answered: usize,
    correct: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingBatch {
    kind: BatchKind,
    request: u64,
}

impl ActiveSession {
    fn current_question(&self) -> Option<&Question> {
        if self.loading.is_some() {
            return None;
        }
        self.queue.get(self.index)
    }

    /// Mark the session as loading and issue the ticket for that request.
    fn begin_request(&mut self, kind: BatchKind, count: usize) -> BatchTicket {
        self.requests += 1;
        self.loading = Some(PendingBatch {
            kind,
            request: self.requests,
        });
        BatchTicket {
            session_id: self.id,
            request: self.requests,
            kind,
            level: self.level,
            category: self.category,
            count,
        }
    }
}

/// Sequencing for one quiz session at a time.
///
/// The controller does no IO. Starting a practice session or exhausting its
/// queue hands out a `BatchTicket`; the caller fetches questions and feeds
/// the result back with `receive_batch`. While a ticket is outstanding the
/// session is loading and rejects answers and advances, so at most one
/// request is ever in flight.
pub struct SessionController {
    batch_size: usize,
    next_id: u64,
    active: Option<ActiveSession>,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl SessionController {
    #[must_use]
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            next_id: 0,
            active: None,
        }
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn next_session_id(&mut self) -> SessionId {
        self.next_id += 1;
        SessionId(self.next_id)
    }

    /// Begin a practice session. Any previous session is dropped.
    pub fn start(&mut self, level: Level, category: Category) -> BatchTicket {
        let id = self.next_session_id();
        let mut session = ActiveSession {
            id,
            level,
            category,
            mode: SessionMode::Practice,
            queue: Vec::new(),
            index: 0,
            answer: None,
            loading: None,
            requests: 0,
            answered: 0,
            correct: 0,
        };
        let ticket = session.begin_request(BatchKind::Initial, self.batch_size);
        debug!(session = %id, %level, %category, "practice session loading");
        self.active = Some(session);
        ticket
    }

    /// Begin a review session over a fixed list. It never requests more
    /// questions and ends once the list is exhausted.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if `questions` is empty.
    pub fn start_review(
        &mut self,
        level: Level,
        category: Category,
        questions: Vec<Question>,
    ) -> Result<SessionId, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }
        let id = self.next_session_id();
        debug!(session = %id, %level, %category, count = questions.len(), "review session started");
        self.active = Some(ActiveSession {
            id,
            level,
            category,
            mode: SessionMode::Review,
            queue: questions,
            index: 0,
            answer: None,
            loading: None,
            requests: 0,
            answered: 0,
            correct: 0,
        });
        Ok(id)
    }

    /// Deliver a provider result for `ticket`.
    pub fn receive_batch(
        &mut self,
        ticket: BatchTicket,
        result: Result<Vec<Question>, ProviderError>,
    ) -> BatchOutcome {
        let Some(session) = self.active.as_mut() else {
            debug!(session = %ticket.session_id, "batch for ended session discarded");
            return BatchOutcome::Discarded;
        };
        let expected = Some(PendingBatch {
            kind: ticket.kind,
            request: ticket.request,
        });
        if session.id != ticket.session_id || session.loading != expected {
            debug!(session = %ticket.session_id, request = ticket.request, "stale batch discarded");
            return BatchOutcome::Discarded;
        }

        let batch = match result {
            Ok(batch) => batch,
            Err(err) => {
                debug!(session = %ticket.session_id, error = %err, "batch failed, ending session");
                self.active = None;
                return BatchOutcome::Aborted;
            }
        };

        let received = batch.len();
        session.loading = None;
        match ticket.kind {
            BatchKind::Initial => {
                session.queue = batch;
                session.index = 0;
            }
            BatchKind::Refill => {
                session.queue.extend(batch);
                session.index += 1;
                session.answer = None;
            }
        }

        if session.current_question().is_some() {
            BatchOutcome::Ready { received }
        } else {
            BatchOutcome::Empty
        }
    }

    /// Answer the current question with the option at `choice`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` when there is no session, the session is
    /// loading, there is no current question, the question was already
    /// answered, or `choice` is not one of its options.
    pub fn submit_answer(&mut self, choice: usize) -> Result<AnswerOutcome, SessionError> {
        let session = self.active.as_mut().ok_or(SessionError::NoSession)?;
        if session.loading.is_some() {
            return Err(SessionError::Loading);
        }
        if session.answer.is_some() {
            return Err(SessionError::AlreadyAnswered);
        }
        let question = session
            .current_question()
            .ok_or(SessionError::NoActiveQuestion)?
            .clone();
        let options = question.options().len();
        if choice >= options {
            return Err(SessionError::InvalidChoice { choice, options });
        }

        let correct = question.is_correct(choice);
        session.answer = Some(AnswerRecord {
            question_id: question.id().clone(),
            choice,
            correct,
        });
        session.answered += 1;
        if correct {
            session.correct += 1;
        }

        Ok(AnswerOutcome {
            question,
            choice,
            correct,
            mode: session.mode,
            level: session.level,
            category: session.category,
        })
    }

    /// Move past the answered question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSession`, `SessionError::Loading` or
    /// `SessionError::NotAnswered`.
    pub fn advance(&mut self) -> Result<AdvanceStep, SessionError> {
        let batch_size = self.batch_size;
        let session = self.active.as_mut().ok_or(SessionError::NoSession)?;
        if session.loading.is_some() {
            return Err(SessionError::Loading);
        }
        if session.answer.is_none() {
            return Err(SessionError::NotAnswered);
        }

        if session.index + 1 < session.queue.len() {
            session.index += 1;
            session.answer = None;
            return Ok(AdvanceStep::Next);
        }

        match session.mode {
            SessionMode::Review => {
                debug!(session = %session.id, "review session finished");
                self.active = None;
                Ok(AdvanceStep::Finished)
            }
            SessionMode::Practice => Ok(AdvanceStep::Refill(
                session.begin_request(BatchKind::Refill, batch_size),
            )),
        }
    }

    /// Leave the session. Returns false if there was none.
    pub fn end(&mut self) -> bool {
        self.active.take().is_some()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match &self.active {
            None => SessionPhase::Idle,
            Some(s) if s.loading.is_some() => SessionPhase::Loading,
            Some(s) => SessionPhase::Active {
                answered: s.answer.is_some(),
            },
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self.phase(), SessionPhase::Loading)
    }

    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(|s| s.id)
    }

    #[must_use]
    pub fn mode(&self) -> Option<SessionMode> {
        self.active.as_ref().map(|s| s.mode)
    }

    #[must_use]
    pub fn level_category(&self) -> Option<(Level, Category)> {
        self.active.as_ref().map(|s| (s.level, s.category))
    }

    /// The question awaiting an answer (or just answered), if any.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.active.as_ref().and_then(ActiveSession::current_question)
    }

    #[must_use]
    pub fn last_answer(&self) -> Option<&AnswerRecord> {
        self.active.as_ref().and_then(|s| s.answer.as_ref())
    }

    #[must_use]
    pub fn progress(&self) -> Option<SessionProgress> {
        self.active.as_ref().map(|s| SessionProgress {
            mode: s.mode,
            level: s.level,
            category: s.category,
            position: s.index + 1,
            queued: s.queue.len(),
            answered: s.answered,
            correct: s.correct,
            loading: s.loading.is_some(),
        })
    }
}
