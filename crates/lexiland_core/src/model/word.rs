//! Vocabulary records: known words, learnt words and cached annotations.
//!
//! # Responsibility
//! - Define the persisted vocabulary shapes and the annotation payload.
//! - Provide key normalization shared by store, state and import paths.
//!
//! # Invariants
//! - `word` fields hold normalized keys (trimmed, lowercased, non-empty).
//! - A cached annotation always carries a non-empty usage example.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Target proficiency level passed to the annotation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Level {
    A2,
    B1,
    #[default]
    B2,
    C1,
    C2,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A2 => "A2",
            Self::B1 => "B1",
            Self::B2 => "B2",
            Self::C1 => "C1",
            Self::C2 => "C2",
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = WordValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "A2" => Ok(Self::A2),
            "B1" => Ok(Self::B1),
            "B2" => Ok(Self::B2),
            "C1" => Ok(Self::C1),
            "C2" => Ok(Self::C2),
            _ => Err(WordValidationError::InvalidLevel(value.to_string())),
        }
    }
}

/// Validation errors for vocabulary records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordValidationError {
    EmptyWord,
    InvalidLevel(String),
    EmptyExample(String),
}

impl Display for WordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyWord => write!(f, "word cannot be empty"),
            Self::InvalidLevel(value) => {
                write!(f, "unsupported level `{value}`; expected A2|B1|B2|C1|C2")
            }
            Self::EmptyExample(word) => {
                write!(f, "annotation for `{word}` has no usage example")
            }
        }
    }
}

impl Error for WordValidationError {}

/// Normalizes a vocabulary key.
///
/// Returns `None` when the input is empty after trimming.
pub fn normalize_word(word: &str) -> Option<String> {
    let trimmed = word.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Word permanently excluded from unknown highlighting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownWord {
    pub word: String,
    pub level: Option<String>,
    pub added_at: i64,
}

impl KnownWord {
    pub fn new(word: &str, level: Option<String>, added_at: i64) -> Result<Self, WordValidationError> {
        let word = normalize_word(word).ok_or(WordValidationError::EmptyWord)?;
        Ok(Self {
            word,
            level,
            added_at,
        })
    }
}

/// Soft-known word that keeps its annotation card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearntWord {
    pub word: String,
    pub learnt_at: i64,
}

impl LearntWord {
    pub fn new(word: &str, learnt_at: i64) -> Result<Self, WordValidationError> {
        let word = normalize_word(word).ok_or(WordValidationError::EmptyWord)?;
        Ok(Self { word, learnt_at })
    }
}

/// Structured linguistic data returned by the annotation service.
///
/// Serialized with the service's camelCase field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordAnnotation {
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_form: Option<String>,
    #[serde(default)]
    pub ipa: String,
    #[serde(default)]
    pub chinese: String,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub example: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub part_of_speech: String,
}

impl WordAnnotation {
    /// Checks the fields the reader cannot render without.
    pub fn validate(&self) -> Result<(), WordValidationError> {
        if self.word.trim().is_empty() {
            return Err(WordValidationError::EmptyWord);
        }
        if self.example.trim().is_empty() {
            return Err(WordValidationError::EmptyExample(self.word.clone()));
        }
        Ok(())
    }
}

/// Annotation persisted in the local cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAnnotation {
    pub word: String,
    pub base_form: Option<String>,
    pub ipa: String,
    pub chinese: String,
    pub definition: String,
    pub example: String,
    pub level: String,
    pub part_of_speech: String,
    pub cached_at: i64,
}

impl CachedAnnotation {
    /// Builds a cache record keyed by `key` (normalized) from a service payload.
    pub fn from_annotation(
        key: &str,
        annotation: &WordAnnotation,
        cached_at: i64,
    ) -> Result<Self, WordValidationError> {
        let word = normalize_word(key).ok_or(WordValidationError::EmptyWord)?;
        annotation.validate()?;
        Ok(Self {
            word,
            base_form: annotation.base_form.clone(),
            ipa: annotation.ipa.clone(),
            chinese: annotation.chinese.clone(),
            definition: annotation.definition.clone(),
            example: annotation.example.clone(),
            level: annotation.level.clone(),
            part_of_speech: annotation.part_of_speech.clone(),
            cached_at,
        })
    }

    pub fn to_annotation(&self) -> WordAnnotation {
        WordAnnotation {
            word: self.word.clone(),
            base_form: self.base_form.clone(),
            ipa: self.ipa.clone(),
            chinese: self.chinese.clone(),
            definition: self.definition.clone(),
            example: self.example.clone(),
            level: self.level.clone(),
            part_of_speech: self.part_of_speech.clone(),
        }
    }
}
