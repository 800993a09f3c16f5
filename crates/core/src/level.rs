//! Proficiency levels and their extraction from evaluator text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The phrase the evaluator is asked to use when announcing a result.
pub const LEVEL_TRIGGER: &str = "proficiency level";

/// A proficiency level on the 1 (beginner) to 10 (native-like) scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct ProficiencyLevel(u8);

impl ProficiencyLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(value: i64) -> Result<Self, LevelParseError> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(LevelParseError::OutOfRange(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for ProficiencyLevel {
    type Error = LevelParseError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProficiencyLevel> for u8 {
    fn from(level: ProficiencyLevel) -> Self {
        level.0
    }
}

impl fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a level could not be read from evaluator text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LevelParseError {
    #[error("evaluator response does not mention a \"{LEVEL_TRIGGER}\"")]
    MissingTrigger,
    #[error("expected a level after \"{LEVEL_TRIGGER}\", found {0:?}")]
    InvalidToken(String),
    #[error("level {0} is outside the 1-10 scale")]
    OutOfRange(i64),
}

/// Reads the level announced in `text`.
///
/// Uses the last case-insensitive occurrence of "proficiency level" and parses the
/// token right after it. Separators such as `:` or `of` before the number, surrounding
/// punctuation and a `/10` suffix are tolerated; anything else is an error, never a
/// guessed default.
///
/// The match is a plain substring, so a later "proficiency levels" is the last
/// occurrence and fails with `InvalidToken("s")` even after a valid announcement.
pub fn extract_level(text: &str) -> Result<ProficiencyLevel, LevelParseError> {
    let lowered = text.to_lowercase();
    // Lowercasing can change byte offsets for some scripts, so search the lowered
    // text and read the remainder from it as well.
    let start = lowered
        .rfind(LEVEL_TRIGGER)
        .ok_or(LevelParseError::MissingTrigger)?;
    let remainder = &lowered[start + LEVEL_TRIGGER.len()..];

    let token = remainder
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric() && c != '/' && c != '-'))
        .find(|word| !word.is_empty() && *word != "-" && *word != "of" && *word != "is")
        .ok_or_else(|| LevelParseError::InvalidToken(String::new()))?;

    let number = token
        .strip_suffix("/10")
        .unwrap_or(token)
        .trim_end_matches('/');
    let value: i64 = number
        .parse()
        .map_err(|_| LevelParseError::InvalidToken(token.to_string()))?;
    ProficiencyLevel::new(value)
}

/// Case-insensitive substring test used for the dialogue's termination phrases.
///
/// This is deliberately a plain substring match: a tutor that says the phrase in
/// passing ends the session too.
pub fn contains_trigger(text: &str, phrase: &str) -> bool {
    text.to_lowercase().contains(&phrase.to_lowercase())
}
