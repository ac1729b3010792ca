//! Annotation cache repository.
//!
//! # Responsibility
//! - Persist one cached annotation per normalized word.
//! - Remember which cached words the user dismissed back to unknown, so a
//!   reload does not re-mark them.
//!
//! # Invariants
//! - Write paths re-validate the usage example before SQL mutations.
//! - Read paths reject rows that lost their example instead of masking them.
//! - Upserting an annotation clears its dismissed flag.

use crate::model::word::{CachedAnnotation, WordValidationError};
use crate::repo::word_repo::count_rows;
use crate::repo::{normalized_key, RepoError, RepoResult, SqliteStore};
use rusqlite::{params, Connection, OptionalExtension, Row};

const ANNOTATION_SELECT_SQL: &str = "SELECT
    word,
    base_form,
    ipa,
    chinese,
    definition,
    example,
    level,
    part_of_speech,
    cached_at
FROM annotations";

/// Repository interface for cached annotations.
pub trait AnnotationRepository {
    fn put_annotation(&self, annotation: &CachedAnnotation) -> RepoResult<()>;
    fn bulk_put_annotations(&self, annotations: &[CachedAnnotation]) -> RepoResult<usize>;
    fn get_annotation(&self, word: &str) -> RepoResult<Option<CachedAnnotation>>;
    fn list_annotations(&self) -> RepoResult<Vec<CachedAnnotation>>;
    fn delete_annotation(&self, word: &str) -> RepoResult<()>;
    fn insert_annotation_if_absent(&self, annotation: &CachedAnnotation) -> RepoResult<bool>;
    fn count_annotations(&self) -> RepoResult<u64>;
    /// Sets the dismissed flag of a cached word. No-op when nothing is cached.
    fn set_annotation_dismissed(&self, word: &str, dismissed: bool) -> RepoResult<()>;
    fn list_dismissed_words(&self) -> RepoResult<Vec<String>>;
}

impl AnnotationRepository for SqliteStore<'_> {
    fn put_annotation(&self, annotation: &CachedAnnotation) -> RepoResult<()> {
        write_annotation(self.connection(), annotation, WriteMode::Upsert)?;
        Ok(())
    }

    fn bulk_put_annotations(&self, annotations: &[CachedAnnotation]) -> RepoResult<usize> {
        let tx = self.connection().unchecked_transaction()?;
        for annotation in annotations {
            write_annotation(&tx, annotation, WriteMode::Upsert)?;
        }
        tx.commit()?;
        Ok(annotations.len())
    }

    fn get_annotation(&self, word: &str) -> RepoResult<Option<CachedAnnotation>> {
        let key = normalized_key(word)?;
        let found = self
            .connection()
            .query_row(
                &format!("{ANNOTATION_SELECT_SQL} WHERE word = ?1;"),
                [key.as_str()],
                parse_annotation_row,
            )
            .optional()?;
        found.map(check_persisted).transpose()
    }

    fn list_annotations(&self) -> RepoResult<Vec<CachedAnnotation>> {
        let mut stmt = self
            .connection()
            .prepare(&format!("{ANNOTATION_SELECT_SQL} ORDER BY word ASC;"))?;
        let rows = stmt.query_map([], parse_annotation_row)?;
        let mut annotations = Vec::new();
        for row in rows {
            annotations.push(check_persisted(row?)?);
        }
        Ok(annotations)
    }

    fn delete_annotation(&self, word: &str) -> RepoResult<()> {
        let key = normalized_key(word)?;
        self.connection()
            .execute("DELETE FROM annotations WHERE word = ?1;", [key.as_str()])?;
        Ok(())
    }

    fn insert_annotation_if_absent(&self, annotation: &CachedAnnotation) -> RepoResult<bool> {
        write_annotation(self.connection(), annotation, WriteMode::InsertIfAbsent)
    }

    fn count_annotations(&self) -> RepoResult<u64> {
        count_rows(self.connection(), "annotations")
    }

    fn set_annotation_dismissed(&self, word: &str, dismissed: bool) -> RepoResult<()> {
        let key = normalized_key(word)?;
        self.connection().execute(
            "UPDATE annotations SET dismissed = ?2 WHERE word = ?1;",
            params![key, dismissed],
        )?;
        Ok(())
    }

    fn list_dismissed_words(&self) -> RepoResult<Vec<String>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT word FROM annotations WHERE dismissed = 1 ORDER BY word ASC;")?;
        let words = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(words)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Upsert,
    InsertIfAbsent,
}

fn write_annotation(
    conn: &Connection,
    annotation: &CachedAnnotation,
    mode: WriteMode,
) -> RepoResult<bool> {
    let key = normalized_key(&annotation.word)?;
    if annotation.example.trim().is_empty() {
        return Err(WordValidationError::EmptyExample(key).into());
    }

    let conflict = match mode {
        WriteMode::Upsert => {
            "ON CONFLICT(word) DO UPDATE SET
                base_form = excluded.base_form,
                ipa = excluded.ipa,
                chinese = excluded.chinese,
                definition = excluded.definition,
                example = excluded.example,
                level = excluded.level,
                part_of_speech = excluded.part_of_speech,
                cached_at = excluded.cached_at,
                dismissed = 0"
        }
        WriteMode::InsertIfAbsent => "ON CONFLICT(word) DO NOTHING",
    };

    let changed = conn.execute(
        &format!(
            "INSERT INTO annotations (
                word,
                base_form,
                ipa,
                chinese,
                definition,
                example,
                level,
                part_of_speech,
                cached_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            {conflict};"
        ),
        params![
            key,
            annotation.base_form.as_deref(),
            annotation.ipa.as_str(),
            annotation.chinese.as_str(),
            annotation.definition.as_str(),
            annotation.example.as_str(),
            annotation.level.as_str(),
            annotation.part_of_speech.as_str(),
            annotation.cached_at,
        ],
    )?;
    Ok(changed == 1)
}

fn parse_annotation_row(row: &Row<'_>) -> rusqlite::Result<CachedAnnotation> {
    Ok(CachedAnnotation {
        word: row.get("word")?,
        base_form: row.get("base_form")?,
        ipa: row.get("ipa")?,
        chinese: row.get("chinese")?,
        definition: row.get("definition")?,
        example: row.get("example")?,
        level: row.get("level")?,
        part_of_speech: row.get("part_of_speech")?,
        cached_at: row.get("cached_at")?,
    })
}

fn check_persisted(annotation: CachedAnnotation) -> RepoResult<CachedAnnotation> {
    if annotation.example.trim().is_empty() {
        return Err(RepoError::InvalidData(format!(
            "annotation `{}` has an empty example in annotations.example",
            annotation.word
        )));
    }
    Ok(annotation)
}
