use async_trait::async_trait;
use jlpt_core::model::{Level, ProgressState, Question, ScoreKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Fixed key under which the progress blob is stored.
pub const PROGRESS_KEY: &str = "jlpt_progress_v1";

/// Current version of the persisted progress record.
pub const PROGRESS_RECORD_VERSION: u32 = 1;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for progress.
///
/// Score keys are flattened to `<LEVEL>_<CATEGORY>` strings so the blob stays
/// a plain JSON object. Missing fields default, so older blobs without
/// `unlockedLevels` still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    #[serde(default = "record_version")]
    pub version: u32,
    #[serde(default)]
    pub scores: BTreeMap<String, u32>,
    #[serde(default)]
    pub unlocked_levels: Vec<Level>,
    #[serde(default)]
    pub wrong_questions: Vec<Question>,
}

fn record_version() -> u32 {
    PROGRESS_RECORD_VERSION
}

impl ProgressRecord {
    #[must_use]
    pub fn from_state(state: &ProgressState) -> Self {
        Self {
            version: PROGRESS_RECORD_VERSION,
            scores: state
                .scores()
                .iter()
                .map(|(key, score)| (key.to_string(), *score))
                .collect(),
            unlocked_levels: state.unlocked_levels().iter().copied().collect(),
            wrong_questions: state.wrong_questions().to_vec(),
        }
    }

    /// Convert the record back into domain state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` for an unknown version or a
    /// malformed score key.
    pub fn into_state(self) -> Result<ProgressState, StorageError> {
        if self.version > PROGRESS_RECORD_VERSION {
            return Err(StorageError::Serialization(format!(
                "unsupported progress version {}",
                self.version
            )));
        }

        let scores = self
            .scores
            .into_iter()
            .map(|(key, score)| {
                key.parse::<ScoreKey>()
                    .map(|key| (key, score))
                    .map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(ProgressState::from_parts(
            scores,
            self.unlocked_levels,
            self.wrong_questions,
        ))
    }

    /// Serialize state to the JSON blob format.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if encoding fails.
    pub fn encode(state: &ProgressState) -> Result<String, StorageError> {
        serde_json::to_string(&Self::from_state(state))
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    /// Parse a JSON blob back into state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the blob is not a valid record.
    pub fn decode(blob: &str) -> Result<ProgressState, StorageError> {
        serde_json::from_str::<Self>(blob)
            .map_err(|e| StorageError::Serialization(e.to_string()))?
            .into_state()
    }
}

/// Repository contract for learner progress.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the saved progress, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored blob is corrupt, or
    /// `StorageError::Connection` if the backend cannot be read.
    async fn load_progress(&self) -> Result<Option<ProgressState>, StorageError>;

    /// Persist progress, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the state cannot be stored.
    async fn save_progress(&self, state: &ProgressState) -> Result<(), StorageError>;
}

/// Simple in-memory key-value repository for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Seed the progress key with a raw blob, valid or not.
    #[must_use]
    pub fn with_raw_progress(self, blob: impl Into<String>) -> Self {
        if let Ok(mut guard) = self.blobs.lock() {
            guard.insert(PROGRESS_KEY.to_string(), blob.into());
        }
        self
    }

    /// The raw blob currently stored under the progress key.
    #[must_use]
    pub fn raw_progress(&self) -> Option<String> {
        self.blobs
            .lock()
            .ok()
            .and_then(|guard| guard.get(PROGRESS_KEY).cloned())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load_progress(&self) -> Result<Option<ProgressState>, StorageError> {
        let blob = {
            let guard = self
                .blobs
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            guard.get(PROGRESS_KEY).cloned()
        };
        blob.as_deref().map(ProgressRecord::decode).transpose()
    }

    async fn save_progress(&self, state: &ProgressState) -> Result<(), StorageError> {
        let blob = ProgressRecord::encode(state)?;
        let mut guard = self
            .blobs
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(PROGRESS_KEY.to_string(), blob);
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let progress: Arc<dyn ProgressRepository> = Arc::new(InMemoryRepository::new());
        Self { progress }
    }
}
