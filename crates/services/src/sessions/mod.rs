mod controller;
mod progress;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use controller::{
    AdvanceStep, AnswerOutcome, AnswerRecord, BatchKind, BatchOutcome, BatchTicket,
    SessionController, SessionId, SessionMode, SessionPhase,
};
pub use progress::SessionProgress;
pub use workflow::{AnswerReport, QuizLoopService, SessionStep};
