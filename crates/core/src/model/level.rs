use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseLevelError {
    #[error("unknown level: {0}")]
    UnknownLevel(String),

    #[error("unknown category: {0}")]
    UnknownCategory(String),
}

//
// ─── LEVEL ─────────────────────────────────────────────────────────────────────
//

/// Proficiency tier, declared in progression order.
///
/// `FiftyOn` is the kana foundation tier ("50音") and always comes first;
/// the JLPT tiers follow from easiest to hardest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    FiftyOn,
    N5,
    N4,
    N3,
    N2,
}

impl Level {
    /// Every level in progression order.
    pub const ALL: [Level; 5] = [Level::FiftyOn, Level::N5, Level::N4, Level::N3, Level::N2];

    /// The entry tier. It is unlocked from the start and can never be locked.
    #[must_use]
    pub fn first() -> Self {
        Self::ALL[0]
    }

    /// The tier unlocked by mastering content at this level, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        let idx = Self::ALL.iter().position(|lvl| *lvl == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    /// Stable identifier used in persisted keys.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Level::FiftyOn => "FIFTY_ON",
            Level::N5 => "N5",
            Level::N4 => "N4",
            Level::N3 => "N3",
            Level::N2 => "N2",
        }
    }

    /// Human-facing name.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Level::FiftyOn => "50音",
            Level::N5 => "N5",
            Level::N4 => "N4",
            Level::N3 => "N3",
            Level::N2 => "N2",
        }
    }

    /// Quiz categories offered at this level.
    #[must_use]
    pub fn categories(self) -> &'static [Category] {
        match self {
            Level::FiftyOn => &[Category::Kana],
            _ => &[Category::Vocabulary, Category::Grammar, Category::Listening],
        }
    }

    #[must_use]
    pub fn allows(self, category: Category) -> bool {
        self.categories().contains(&category)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Accepts the persisted code (`FIFTY_ON`, `N5`), the label (`50音`) and
    /// lowercase variants.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Level::ALL
            .into_iter()
            .find(|lvl| {
                lvl.code().eq_ignore_ascii_case(trimmed) || lvl.label() == trimmed
            })
            .or_else(|| match trimmed.to_ascii_lowercase().as_str() {
                "kana" | "fifty-on" | "fiftyon" => Some(Level::FiftyOn),
                _ => None,
            })
            .ok_or_else(|| ParseLevelError::UnknownLevel(s.to_string()))
    }
}

//
// ─── CATEGORY ──────────────────────────────────────────────────────────────────
//

/// Quiz topic area. Which categories apply depends on the level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Kana,
    Vocabulary,
    Grammar,
    Listening,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Kana,
        Category::Vocabulary,
        Category::Grammar,
        Category::Listening,
    ];

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Category::Kana => "KANA",
            Category::Vocabulary => "VOCABULARY",
            Category::Grammar => "GRAMMAR",
            Category::Listening => "LISTENING",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Category::Kana => "Kana recognition",
            Category::Vocabulary => "Characters & vocabulary",
            Category::Grammar => "Grammar",
            Category::Listening => "Listening",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = ParseLevelError;

    /// Accepts the persisted code (`VOCABULARY`) and the `Display` label,
    /// both case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Category::ALL
            .into_iter()
            .find(|cat| {
                cat.code().eq_ignore_ascii_case(trimmed)
                    || cat.label().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| ParseLevelError::UnknownCategory(s.to_string()))
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
