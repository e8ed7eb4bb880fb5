#![forbid(unsafe_code)]

pub mod app_services;
pub mod bank;
pub mod error;
pub mod observer;
pub mod progress_service;
pub mod provider;
pub mod sessions;

pub use sessions as session;

pub use app_services::{AppServices, QuizOptions};
pub use bank::{BankFirstProvider, QuestionBank, fisher_yates, sample_without_replacement};
pub use error::{AppServicesError, BankError, ProviderError, SessionError};
pub use observer::{QuizObserver, TracingObserver};
pub use progress_service::ProgressService;
pub use provider::QuestionProvider;

pub use sessions::{
    AnswerReport, BatchOutcome, QuizLoopService, SessionController, SessionMode, SessionPhase,
    SessionStep,
};
