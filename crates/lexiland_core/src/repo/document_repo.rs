//! Saved document repository.
//!
//! # Responsibility
//! - Persist raw document content; tokenized trees are never stored.
//!
//! # Invariants
//! - Document list is sorted by `last_opened_at DESC, id ASC`.
//! - `touch_document` on a missing id returns `NotFound`.

use crate::model::document::{DocumentId, SavedDocument};
use crate::repo::{RepoError, RepoResult, SqliteStore};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

const DOCUMENT_SELECT_SQL: &str = "SELECT
    id,
    title,
    content,
    created_at,
    last_opened_at
FROM documents";

/// Repository interface for saved documents.
pub trait DocumentRepository {
    fn save_document(&self, document: &SavedDocument) -> RepoResult<()>;
    fn get_document(&self, id: DocumentId) -> RepoResult<Option<SavedDocument>>;
    fn list_documents(&self) -> RepoResult<Vec<SavedDocument>>;
    fn touch_document(&self, id: DocumentId, opened_at: i64) -> RepoResult<()>;
    fn delete_document(&self, id: DocumentId) -> RepoResult<()>;
}

impl DocumentRepository for SqliteStore<'_> {
    fn save_document(&self, document: &SavedDocument) -> RepoResult<()> {
        self.connection().execute(
            "INSERT INTO documents (id, title, content, created_at, last_opened_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                last_opened_at = excluded.last_opened_at;",
            params![
                document.id.to_string(),
                document.title.as_str(),
                document.content.as_str(),
                document.created_at,
                document.last_opened_at,
            ],
        )?;
        Ok(())
    }

    fn get_document(&self, id: DocumentId) -> RepoResult<Option<SavedDocument>> {
        let row = self
            .connection()
            .query_row(
                &format!("{DOCUMENT_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                read_document_row,
            )
            .optional()?;
        row.map(parse_document).transpose()
    }

    fn list_documents(&self) -> RepoResult<Vec<SavedDocument>> {
        let mut stmt = self.connection().prepare(&format!(
            "{DOCUMENT_SELECT_SQL} ORDER BY last_opened_at DESC, id ASC;"
        ))?;
        let rows = stmt.query_map([], read_document_row)?;
        let mut documents = Vec::new();
        for row in rows {
            documents.push(parse_document(row?)?);
        }
        Ok(documents)
    }

    fn touch_document(&self, id: DocumentId, opened_at: i64) -> RepoResult<()> {
        let changed = self.connection().execute(
            "UPDATE documents SET last_opened_at = ?2 WHERE id = ?1;",
            params![id.to_string(), opened_at],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_document(&self, id: DocumentId) -> RepoResult<()> {
        self.connection()
            .execute("DELETE FROM documents WHERE id = ?1;", [id.to_string()])?;
        Ok(())
    }
}

struct DocumentRow {
    id: String,
    title: String,
    content: String,
    created_at: i64,
    last_opened_at: i64,
}

fn read_document_row(row: &Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get("id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        last_opened_at: row.get("last_opened_at")?,
    })
}

fn parse_document(row: DocumentRow) -> RepoResult<SavedDocument> {
    let id = Uuid::parse_str(&row.id).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{}` in documents.id", row.id))
    })?;
    Ok(SavedDocument {
        id,
        title: row.title,
        content: row.content,
        created_at: row.created_at,
        last_opened_at: row.last_opened_at,
    })
}
