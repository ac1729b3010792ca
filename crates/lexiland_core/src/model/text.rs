//! Segmented text tree produced by the tokenizer.
//!
//! # Invariants
//! - All offsets are absolute byte offsets into the source document text.
//! - `start < end` for every node, and `text == source[start..end]`.
//! - Children tile their parent span in ascending order without gaps.

use serde::{Deserialize, Serialize};

/// Classification of one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Word characters, optionally joined by one internal apostrophe.
    Word,
    /// Single character that is neither a word character nor whitespace.
    Punctuation,
    /// Run of whitespace.
    Whitespace,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::Punctuation => "punctuation",
            Self::Whitespace => "whitespace",
        }
    }
}

/// Smallest segmentation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn is_word(&self) -> bool {
        self.kind == TokenKind::Word
    }

    /// Returns the lowercased vocabulary key for word tokens.
    pub fn word_key(&self) -> Option<String> {
        if self.is_word() {
            Some(self.text.to_lowercase())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub id: String,
    /// Exact source slice, including whitespace carried over from the
    /// previous sentence boundary.
    pub text: String,
    pub tokens: Vec<Token>,
    pub start: usize,
    pub end: usize,
}

impl Sentence {
    /// Sentence text without surrounding whitespace.
    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }

    pub fn words(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().filter(|token| token.is_word())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub id: String,
    /// Trimmed paragraph text; equals `source[start..end]`.
    pub text: String,
    pub sentences: Vec<Sentence>,
    pub start: usize,
    pub end: usize,
}

impl Paragraph {
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.sentences
            .iter()
            .flat_map(|sentence| sentence.tokens.iter())
    }
}
