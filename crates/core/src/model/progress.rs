use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::model::level::{Category, Level};
use crate::model::question::Question;

/// Score at which a (level, category) pair counts as mastered.
pub const MASTERY_THRESHOLD: u32 = 100;

/// Points awarded for a correct practice answer.
pub const CORRECT_POINTS: i32 = 10;

/// Points deducted for an incorrect practice answer.
pub const INCORRECT_POINTS: i32 = -5;

//
// ─── SCORE KEY ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreKeyError {
    #[error("malformed score key: {0}")]
    Malformed(String),
}

/// Composite key for a mastery score.
///
/// The string form is `<LEVEL>_<CATEGORY>`, e.g. `N5_VOCABULARY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScoreKey {
    pub level: Level,
    pub category: Category,
}

impl ScoreKey {
    #[must_use]
    pub fn new(level: Level, category: Category) -> Self {
        Self { level, category }
    }
}

impl fmt::Display for ScoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.level.code(), self.category.code())
    }
}

impl FromStr for ScoreKey {
    type Err = ScoreKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Level codes may contain '_' themselves (FIFTY_ON), categories never do.
        let (level, category) = s
            .rsplit_once('_')
            .ok_or_else(|| ScoreKeyError::Malformed(s.to_string()))?;
        let level = level
            .parse::<Level>()
            .map_err(|_| ScoreKeyError::Malformed(s.to_string()))?;
        let category = category
            .parse::<Category>()
            .map_err(|_| ScoreKeyError::Malformed(s.to_string()))?;
        Ok(Self { level, category })
    }
}

//
// ─── SCORE UPDATE ──────────────────────────────────────────────────────────────
//

/// Before/after view of a single score change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreUpdate {
    pub key: ScoreKey,
    pub previous: u32,
    pub current: u32,
    /// Level added to the unlocked set by this update, if any.
    pub unlocked: Option<Level>,
}

impl ScoreUpdate {
    /// True only for the update that moves the score across the threshold.
    #[must_use]
    pub fn mastery_achieved(&self) -> bool {
        self.previous < MASTERY_THRESHOLD && self.current >= MASTERY_THRESHOLD
    }

    #[must_use]
    pub fn delta(&self) -> i64 {
        i64::from(self.current) - i64::from(self.previous)
    }
}

//
// ─── PROGRESS STATE ────────────────────────────────────────────────────────────
//

/// Everything the learner has achieved so far.
///
/// Invariants:
/// - the first level is always unlocked and unlocked levels are never removed
/// - scores never go below zero; they are stored unbounded above
/// - wrong questions are unique by id and kept in insertion order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    scores: BTreeMap<ScoreKey, u32>,
    unlocked_levels: BTreeSet<Level>,
    wrong_questions: Vec<Question>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            scores: BTreeMap::new(),
            unlocked_levels: BTreeSet::from([Level::first()]),
            wrong_questions: Vec::new(),
        }
    }
}

impl ProgressState {
    /// Rebuild state from persisted parts, restoring invariants.
    #[must_use]
    pub fn from_parts(
        scores: BTreeMap<ScoreKey, u32>,
        unlocked_levels: impl IntoIterator<Item = Level>,
        wrong_questions: Vec<Question>,
    ) -> Self {
        Self {
            scores,
            unlocked_levels: unlocked_levels.into_iter().collect(),
            wrong_questions,
        }
        .normalized()
    }

    /// Ensure the first level is unlocked and drop duplicate wrong questions,
    /// keeping the first occurrence.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.unlocked_levels.insert(Level::first());
        let mut seen = HashSet::new();
        self.wrong_questions.retain(|q| seen.insert(q.id().clone()));
        self
    }

    #[must_use]
    pub fn scores(&self) -> &BTreeMap<ScoreKey, u32> {
        &self.scores
    }

    #[must_use]
    pub fn unlocked_levels(&self) -> &BTreeSet<Level> {
        &self.unlocked_levels
    }

    #[must_use]
    pub fn wrong_questions(&self) -> &[Question] {
        &self.wrong_questions
    }

    /// Stored score; may exceed 100.
    #[must_use]
    pub fn score(&self, level: Level, category: Category) -> u32 {
        self.scores
            .get(&ScoreKey::new(level, category))
            .copied()
            .unwrap_or(0)
    }

    /// Score clamped to the 0..=100 mastery scale.
    #[must_use]
    pub fn display_score(&self, level: Level, category: Category) -> u32 {
        self.score(level, category).min(MASTERY_THRESHOLD)
    }

    #[must_use]
    pub fn is_mastered(&self, level: Level, category: Category) -> bool {
        self.score(level, category) >= MASTERY_THRESHOLD
    }

    #[must_use]
    pub fn is_unlocked(&self, level: Level) -> bool {
        self.unlocked_levels.contains(&level)
    }

    #[must_use]
    pub fn is_wrong(&self, id: &QuestionId) -> bool {
        self.wrong_questions.iter().any(|q| q.id() == id)
    }

    /// Wrong questions filed under the given pair, in insertion order.
    pub fn wrong_questions_for(
        &self,
        level: Level,
        category: Category,
    ) -> impl Iterator<Item = &Question> {
        self.wrong_questions
            .iter()
            .filter(move |q| q.level() == level && q.category() == category)
    }

    /// Add `delta` to the pair's score, clamping at zero.
    ///
    /// Reaching the threshold unlocks the next level if there is one. The
    /// insert is idempotent, so repeated updates above 100 change nothing
    /// but the stored number.
    pub fn apply_score(&mut self, level: Level, category: Category, delta: i32) -> ScoreUpdate {
        let key = ScoreKey::new(level, category);
        let previous = self.scores.get(&key).copied().unwrap_or(0);
        let current = previous.saturating_add_signed(delta);
        self.scores.insert(key, current);

        let mut unlocked = None;
        if current >= MASTERY_THRESHOLD {
            if let Some(next) = level.next() {
                if self.unlocked_levels.insert(next) {
                    unlocked = Some(next);
                }
            }
        }

        ScoreUpdate {
            key,
            previous,
            current,
            unlocked,
        }
    }

    /// Append a missed question. Returns false if its id is already queued.
    pub fn record_wrong(&mut self, question: Question) -> bool {
        if self.is_wrong(question.id()) {
            return false;
        }
        self.wrong_questions.push(question);
        true
    }

    /// Drop a question from the review queue. Returns false if it was absent.
    pub fn clear_wrong(&mut self, id: &QuestionId) -> bool {
        let before = self.wrong_questions.len();
        self.wrong_questions.retain(|q| q.id() != id);
        self.wrong_questions.len() != before
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
