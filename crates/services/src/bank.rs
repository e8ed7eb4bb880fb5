use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error};

use jlpt_core::model::{Category, Level, Question, QuestionDraft};

use crate::error::{BankError, ProviderError};
use crate::provider::QuestionProvider;

const BUILTIN_BANK: &str = include_str!("../data/builtin_bank.json");

/// Shuffle `items` in place with the Fisher-Yates algorithm.
///
/// Walks from the back, swapping each slot with a uniformly chosen slot at or
/// before it. With a seeded rng the permutation is reproducible.
pub fn fisher_yates<T, R: Rng>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// Pick up to `count` distinct entries: shuffle, then keep the prefix.
pub fn sample_without_replacement<T, R: Rng>(
    mut candidates: Vec<T>,
    count: usize,
    rng: &mut R,
) -> Vec<T> {
    fisher_yates(&mut candidates, rng);
    candidates.truncate(count);
    candidates
}

//
// ─── QUESTION BANK ─────────────────────────────────────────────────────────────
//

/// Local, fixed set of questions consulted before any provider.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Build a bank, keeping the first question for each id.
    #[must_use]
    pub fn new(questions: Vec<Question>) -> Self {
        let mut bank = Self::default();
        bank.extend(questions);
        bank
    }

    /// The demo questions shipped with the crate.
    #[must_use]
    pub fn builtin() -> Self {
        match Self::from_json(BUILTIN_BANK) {
            Ok(bank) => bank,
            Err(err) => {
                error!(error = %err, "built-in question bank is invalid");
                Self::default()
            }
        }
    }

    /// Parse a JSON array of question drafts.
    ///
    /// # Errors
    ///
    /// Returns `BankError` if the JSON is malformed or any entry fails
    /// validation.
    pub fn from_json(json: &str) -> Result<Self, BankError> {
        let drafts: Vec<QuestionDraft> = serde_json::from_str(json)?;
        let questions = drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| {
                draft
                    .validate()
                    .map_err(|source| BankError::Question { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(questions))
    }

    /// Read a bank file from disk.
    ///
    /// # Errors
    ///
    /// Returns `BankError` on IO or parse failures.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BankError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Add questions whose ids are not already present.
    pub fn extend(&mut self, questions: impl IntoIterator<Item = Question>) {
        let mut seen: HashSet<_> = self.questions.iter().map(|q| q.id().clone()).collect();
        for question in questions {
            if seen.insert(question.id().clone()) {
                self.questions.push(question);
            }
        }
    }

    #[must_use]
    pub fn into_questions(self) -> Vec<Question> {
        self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn matching(&self, level: Level, category: Category) -> Vec<&Question> {
        self.questions
            .iter()
            .filter(|q| q.level() == level && q.category() == category)
            .collect()
    }
}

//
// ─── BANK-FIRST PROVIDER ───────────────────────────────────────────────────────
//

/// Serves from the local bank when it can fill a whole batch.
///
/// - at least `count` matches: sample `count` of them without replacement
/// - fewer, with a fallback: delegate the whole request to the fallback
/// - fewer, without a fallback: return every match, shuffled (maybe none)
pub struct BankFirstProvider {
    bank: QuestionBank,
    fallback: Option<Arc<dyn QuestionProvider>>,
    rng: Mutex<StdRng>,
}

impl BankFirstProvider {
    #[must_use]
    pub fn new(bank: QuestionBank) -> Self {
        Self {
            bank,
            fallback: None,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Use a fixed seed so sampling is reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn QuestionProvider>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    fn sample(
        &self,
        candidates: Vec<Question>,
        count: usize,
    ) -> Result<Vec<Question>, ProviderError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        Ok(sample_without_replacement(candidates, count, &mut *rng))
    }
}

#[async_trait]
impl QuestionProvider for BankFirstProvider {
    async fn request_batch(
        &self,
        level: Level,
        category: Category,
        count: usize,
    ) -> Result<Vec<Question>, ProviderError> {
        let matching: Vec<Question> = self
            .bank
            .matching(level, category)
            .into_iter()
            .cloned()
            .collect();

        if matching.len() >= count {
            debug!(%level, %category, count, available = matching.len(), "serving batch from bank");
            return self.sample(matching, count);
        }

        if let Some(fallback) = &self.fallback {
            debug!(%level, %category, count, available = matching.len(), "bank too small, delegating");
            return fallback.request_batch(level, category, count).await;
        }

        debug!(%level, %category, count, available = matching.len(), "bank too small, no fallback");
        self.sample(matching, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jlpt_core::model::QuestionId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn build_question(id: &str, level: Level, category: Category) -> Question {
        QuestionDraft {
            id: Some(QuestionId::new(id)),
            level,
            category,
            text: format!("Q{id}"),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_index: 0,
            translation: String::new(),
            core_analysis: String::new(),
            wrong_options_analysis: String::new(),
            listening_text: None,
        }
        .validate()
        .unwrap()
    }

    fn grammar_bank(n: usize) -> QuestionBank {
        QuestionBank::new(
            (0..n)
                .map(|i| build_question(&format!("g{i}"), Level::N4, Category::Grammar))
                .collect(),
        )
    }

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QuestionProvider for CountingProvider {
        async fn request_batch(
            &self,
            level: Level,
            category: Category,
            count: usize,
        ) -> Result<Vec<Question>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..count)
                .map(|i| build_question(&format!("remote{i}"), level, category))
                .collect())
        }
    }

    #[test]
    fn fisher_yates_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut items: Vec<u32> = (0..50).collect();
        fisher_yates(&mut items, &mut rng);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn fisher_yates_is_deterministic_for_a_seed() {
        let mut a: Vec<u32> = (0..20).collect();
        let mut b = a.clone();
        fisher_yates(&mut a, &mut StdRng::seed_from_u64(42));
        fisher_yates(&mut b, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn fisher_yates_handles_tiny_slices() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut empty: Vec<u8> = Vec::new();
        fisher_yates(&mut empty, &mut rng);
        let mut one = vec![9];
        fisher_yates(&mut one, &mut rng);
        assert_eq!(one, vec![9]);
    }

    #[test]
    fn sampling_never_repeats() {
        let mut rng = StdRng::seed_from_u64(3);
        let picked = sample_without_replacement((0..10).collect::<Vec<u32>>(), 4, &mut rng);
        assert_eq!(picked.len(), 4);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn builtin_bank_parses() {
        let bank = QuestionBank::builtin();
        assert_eq!(bank.len(), 5);
        assert_eq!(bank.matching(Level::FiftyOn, Category::Kana).len(), 2);
        assert_eq!(bank.matching(Level::N2, Category::Grammar).len(), 2);
        assert!(bank.matching(Level::N3, Category::Listening).is_empty());
    }

    #[test]
    fn bank_rejects_invalid_entries() {
        let json = r#"[{"level":"N5","category":"KANA","text":"x","options":["a","b"],"correctIndex":0}]"#;
        assert!(matches!(
            QuestionBank::from_json(json),
            Err(BankError::Question { index: 0, .. })
        ));
    }

    #[test]
    fn bank_keeps_first_question_per_id() {
        let mut bank = grammar_bank(2);
        bank.extend(vec![build_question("g0", Level::N4, Category::Grammar)]);
        assert_eq!(bank.len(), 2);
    }

    #[tokio::test]
    async fn full_bank_serves_without_fallback() {
        let fallback = Arc::new(CountingProvider::default());
        let provider = BankFirstProvider::new(grammar_bank(6))
            .with_seed(11)
            .with_fallback(fallback.clone());

        let batch = provider
            .request_batch(Level::N4, Category::Grammar, 4)
            .await
            .unwrap();

        assert_eq!(batch.len(), 4);
        let ids: HashSet<_> = batch.iter().map(|q| q.id().clone()).collect();
        assert_eq!(ids.len(), 4);
        assert!(batch.iter().all(|q| q.id().as_str().starts_with('g')));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn small_bank_delegates_to_fallback() {
        let fallback = Arc::new(CountingProvider::default());
        let provider = BankFirstProvider::new(grammar_bank(2)).with_fallback(fallback.clone());

        let batch = provider
            .request_batch(Level::N4, Category::Grammar, 5)
            .await
            .unwrap();

        assert_eq!(batch.len(), 5);
        assert!(batch.iter().all(|q| q.id().as_str().starts_with("remote")));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn small_bank_without_fallback_returns_what_it_has() {
        let provider = BankFirstProvider::new(grammar_bank(2)).with_seed(5);

        let batch = provider
            .request_batch(Level::N4, Category::Grammar, 10)
            .await
            .unwrap();
        assert_eq!(batch.len(), 2);

        let none = provider
            .request_batch(Level::N3, Category::Listening, 10)
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
