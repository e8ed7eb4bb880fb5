use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::model::level::{Category, Level};

//
// ─── QUESTION TYPES ────────────────────────────────────────────────────────────
//

/// Unvalidated question as received from a provider or a bank file.
///
/// The id is optional because generated batches rarely carry one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    #[serde(default)]
    pub id: Option<QuestionId>,
    pub level: Level,
    pub category: Category,
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub core_analysis: String,
    #[serde(default)]
    pub wrong_options_analysis: String,
    #[serde(default)]
    pub listening_text: Option<String>,
}

impl QuestionDraft {
    /// Validate the draft into an immutable `Question`.
    ///
    /// A missing id is replaced with a generated one.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the id or prompt is blank, fewer than two
    /// options are given, the correct index is out of bounds, or the category
    /// is not offered at the level.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let id = self.id.unwrap_or_else(QuestionId::generate);
        if id.is_blank() {
            return Err(QuestionError::EmptyId);
        }
        if self.text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if self.options.len() < 2 {
            return Err(QuestionError::TooFewOptions(self.options.len()));
        }
        if self.correct_index >= self.options.len() {
            return Err(QuestionError::CorrectIndexOutOfBounds {
                index: self.correct_index,
                options: self.options.len(),
            });
        }
        if !self.level.allows(self.category) {
            return Err(QuestionError::CategoryNotOffered {
                level: self.level,
                category: self.category,
            });
        }

        let listening_text = self.listening_text.filter(|t| !t.trim().is_empty());

        Ok(Question {
            id,
            level: self.level,
            category: self.category,
            text: self.text,
            options: self.options,
            correct_index: self.correct_index,
            translation: self.translation,
            core_analysis: self.core_analysis,
            wrong_options_analysis: self.wrong_options_analysis,
            listening_text,
        })
    }
}

/// A multiple-choice quiz question.
///
/// Fields are private and deserialization goes through `QuestionDraft`, so
/// every `Question` has passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "QuestionDraft")]
pub struct Question {
    id: QuestionId,
    level: Level,
    category: Category,
    text: String,
    options: Vec<String>,
    correct_index: usize,
    translation: String,
    core_analysis: String,
    wrong_options_analysis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    listening_text: Option<String>,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
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
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    #[must_use]
    pub fn translation(&self) -> &str {
        &self.translation
    }

    /// Explanation of why the correct option is right.
    #[must_use]
    pub fn core_analysis(&self) -> &str {
        &self.core_analysis
    }

    /// Notes on each distractor.
    #[must_use]
    pub fn wrong_options_analysis(&self) -> &str {
        &self.wrong_options_analysis
    }

    /// Transcript read aloud for listening questions.
    #[must_use]
    pub fn listening_text(&self) -> Option<&str> {
        self.listening_text.as_deref()
    }

    #[must_use]
    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct_index
    }

    #[must_use]
    pub fn correct_option(&self) -> Option<&str> {
        self.options.get(self.correct_index).map(String::as_str)
    }
}

impl TryFrom<QuestionDraft> for Question {
    type Error = QuestionError;

    fn try_from(draft: QuestionDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

//
// ─── QUESTION VALIDATION ERRORS ────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question id cannot be empty")]
    EmptyId,

    #[error("question text cannot be empty")]
    EmptyText,

    #[error("question needs at least two options, got {0}")]
    TooFewOptions(usize),

    #[error("correct index {index} out of bounds for {options} options")]
    CorrectIndexOutOfBounds { index: usize, options: usize },

    #[error("category {category:?} is not offered at level {level:?}")]
    CategoryNotOffered { level: Level, category: Category },
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> QuestionDraft {
        QuestionDraft {
            id: Some(QuestionId::new("n5v1")),
            level: Level::N5,
            category: Category::Vocabulary,
            text: "あした、いっしょにえいがを（　）。".into(),
            options: vec![
                "みます".into(),
                "みました".into(),
                "みましょう".into(),
                "みてください".into(),
            ],
            correct_index: 2,
            translation: "Let's watch a movie together tomorrow.".into(),
            core_analysis: "～ましょう expresses a suggestion.".into(),
            wrong_options_analysis: "The others are plain, past and request forms.".into(),
            listening_text: None,
        }
    }

    #[test]
    fn valid_draft_becomes_question() {
        let q = draft().validate().unwrap();
        assert_eq!(q.id(), &QuestionId::new("n5v1"));
        assert!(q.is_correct(2));
        assert!(!q.is_correct(0));
        assert_eq!(q.correct_option(), Some("みましょう"));
    }

    #[test]
    fn missing_id_is_generated() {
        let mut d = draft();
        d.id = None;
        let q = d.validate().unwrap();
        assert!(!q.id().is_blank());
    }

    #[test]
    fn rejects_single_option() {
        let mut d = draft();
        d.options.truncate(1);
        d.correct_index = 0;
        assert_eq!(d.validate().unwrap_err(), QuestionError::TooFewOptions(1));
    }

    #[test]
    fn rejects_out_of_bounds_answer() {
        let mut d = draft();
        d.correct_index = 4;
        assert!(matches!(
            d.validate().unwrap_err(),
            QuestionError::CorrectIndexOutOfBounds { index: 4, options: 4 }
        ));
    }

    #[test]
    fn rejects_category_not_offered_at_level() {
        let mut d = draft();
        d.level = Level::FiftyOn;
        assert!(matches!(
            d.validate().unwrap_err(),
            QuestionError::CategoryNotOffered { .. }
        ));
    }

    #[test]
    fn blank_listening_text_is_dropped() {
        let mut d = draft();
        d.listening_text = Some("  ".into());
        assert_eq!(d.validate().unwrap().listening_text(), None);
    }

    #[test]
    fn draft_accepts_camel_case_json_without_id() {
        let json = r#"{
            "level": "N2",
            "category": "GRAMMAR",
            "text": "合格できたのは、皆さんの応援が（　）のことです。",
            "options": ["あって", "ありながら", "あるがゆえ", "あってこそ"],
            "correctIndex": 3,
            "translation": "I passed only thanks to everyone's support.",
            "coreAnalysis": "～あってこそ stresses the sole necessary condition.",
            "wrongOptionsAnalysis": "あって only links clauses."
        }"#;
        let d: QuestionDraft = serde_json::from_str(json).unwrap();
        assert!(d.id.is_none());
        let q = d.validate().unwrap();
        assert_eq!(q.level(), Level::N2);
        assert_eq!(q.correct_index(), 3);
    }

    #[test]
    fn question_json_round_trips_through_validation() {
        let q = draft().validate().unwrap();
        let json = serde_json::to_string(&q).unwrap();
        let back: Question = serde_json::from_str(&json).unwrap();
        assert_eq!(back, q);
    }

    #[test]
    fn invalid_question_json_is_rejected() {
        let out_of_bounds = r#"{"id":"w1","level":"N5","category":"VOCABULARY",
            "text":"x","options":["a","b"],"correctIndex":9,
            "translation":"","coreAnalysis":"","wrongOptionsAnalysis":""}"#;
        let err = serde_json::from_str::<Question>(out_of_bounds).unwrap_err();
        assert!(err.to_string().contains("out of bounds"));

        let single_option = r#"{"id":"w2","level":"N5","category":"VOCABULARY",
            "text":"x","options":["a"],"correctIndex":0}"#;
        assert!(serde_json::from_str::<Question>(single_option).is_err());
    }
}
