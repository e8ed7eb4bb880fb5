use std::sync::Arc;

use jlpt_core::DEFAULT_BATCH_SIZE;
use storage::repository::Storage;

use crate::bank::{BankFirstProvider, QuestionBank};
use crate::error::AppServicesError;
use crate::observer::{QuizObserver, TracingObserver};
use crate::progress_service::ProgressService;
use crate::provider::QuestionProvider;
use crate::sessions::{QuizLoopService, SessionController};

/// Knobs for assembling the quiz services.
#[derive(Debug, Clone, Default)]
pub struct QuizOptions {
    /// Questions per provider request; `None` uses the default.
    pub batch_size: Option<usize>,
    /// Fixed seed for bank sampling.
    pub seed: Option<u64>,
}

/// Assembles app-facing services over a storage backend.
#[derive(Clone)]
pub struct AppServices {
    progress: ProgressService,
    quiz_loop: Arc<QuizLoopService>,
    batch_size: usize,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        bank: QuestionBank,
        options: QuizOptions,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, bank, options))
    }

    /// Build services over in-memory storage.
    #[must_use]
    pub fn in_memory(bank: QuestionBank, options: QuizOptions) -> Self {
        Self::from_storage(&Storage::in_memory(), bank, options)
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, bank: QuestionBank, options: QuizOptions) -> Self {
        let mut provider = BankFirstProvider::new(bank);
        if let Some(seed) = options.seed {
            provider = provider.with_seed(seed);
        }
        let provider: Arc<dyn QuestionProvider> = Arc::new(provider);
        Self::with_provider(storage, provider, options)
    }

    /// Build services with a caller-supplied question provider.
    #[must_use]
    pub fn with_provider(
        storage: &Storage,
        provider: Arc<dyn QuestionProvider>,
        options: QuizOptions,
    ) -> Self {
        let progress = ProgressService::new(Arc::clone(&storage.progress));
        let tracing_observer: Arc<dyn QuizObserver> = Arc::new(TracingObserver);
        let quiz_loop = Arc::new(
            QuizLoopService::new(provider, progress.clone()).with_observer(tracing_observer),
        );
        Self {
            progress,
            quiz_loop,
            batch_size: options.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        }
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressService {
        &self.progress
    }

    #[must_use]
    pub fn quiz_loop(&self) -> Arc<QuizLoopService> {
        Arc::clone(&self.quiz_loop)
    }

    /// A fresh, idle session controller sized for this configuration.
    #[must_use]
    pub fn new_session(&self) -> SessionController {
        SessionController::new(self.batch_size)
    }
}
