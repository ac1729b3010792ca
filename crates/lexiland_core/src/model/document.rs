//! Reader documents.
//!
//! # Invariants
//! - `Document::paragraphs` is always derived from `content` by the tokenizer.
//! - Only `SavedDocument` (raw content) is persisted.

use crate::model::text::Paragraph;
use crate::tokenize::tokenize;
use uuid::Uuid;

pub type DocumentId = Uuid;

/// In-memory document owned by application state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub content: String,
    pub paragraphs: Vec<Paragraph>,
    pub created_at: i64,
}

impl Document {
    /// Creates a document with a generated id and tokenized content.
    pub fn new(title: impl Into<String>, content: impl Into<String>, created_at: i64) -> Self {
        Self::with_id(Uuid::new_v4(), title, content, created_at)
    }

    /// Creates a document with a caller-provided id, used when restoring
    /// saved documents.
    pub fn with_id(
        id: DocumentId,
        title: impl Into<String>,
        content: impl Into<String>,
        created_at: i64,
    ) -> Self {
        let content = content.into();
        let paragraphs = tokenize(&content);
        Self {
            id,
            title: title.into(),
            content,
            paragraphs,
            created_at,
        }
    }

    pub fn to_saved(&self, last_opened_at: i64) -> SavedDocument {
        SavedDocument {
            id: self.id,
            title: self.title.clone(),
            content: self.content.clone(),
            created_at: self.created_at,
            last_opened_at,
        }
    }
}

/// Persisted raw document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDocument {
    pub id: DocumentId,
    pub title: String,
    pub content: String,
    pub created_at: i64,
    pub last_opened_at: i64,
}

impl SavedDocument {
    pub fn into_document(self) -> Document {
        Document::with_id(self.id, self.title, self.content, self.created_at)
    }
}

/// Derives a document title from an imported file name by dropping the
/// extension.
pub fn title_from_file_name(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(index) if index > 0 => file_name[..index].to_string(),
        _ => file_name.to_string(),
    }
}
