//! Known-word and learnt-word repositories.
//!
//! # Responsibility
//! - Persist the two vocabulary sets keyed by normalized word.
//! - Provide bulk upsert for seeding and the merge primitive used by import.
//!
//! # Invariants
//! - Bulk writes run in one transaction: all rows land or none do.
//! - List results are ordered by word for deterministic export.

use crate::model::word::{KnownWord, LearntWord};
use crate::repo::{normalized_key, RepoResult, SqliteStore};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Repository interface for the known-word set.
pub trait KnownWordRepository {
    fn put_known_word(&self, word: &KnownWord) -> RepoResult<()>;
    /// Upserts many words at once and returns how many rows were written.
    fn bulk_put_known_words(&self, words: &[KnownWord]) -> RepoResult<usize>;
    fn get_known_word(&self, word: &str) -> RepoResult<Option<KnownWord>>;
    fn list_known_words(&self) -> RepoResult<Vec<KnownWord>>;
    fn delete_known_word(&self, word: &str) -> RepoResult<()>;
    /// Inserts only when the key is new. Returns `false` when it already existed.
    fn insert_known_word_if_absent(&self, word: &KnownWord) -> RepoResult<bool>;
    fn count_known_words(&self) -> RepoResult<u64>;
}

/// Repository interface for the learnt-word set.
pub trait LearntWordRepository {
    fn put_learnt_word(&self, word: &LearntWord) -> RepoResult<()>;
    fn bulk_put_learnt_words(&self, words: &[LearntWord]) -> RepoResult<usize>;
    fn get_learnt_word(&self, word: &str) -> RepoResult<Option<LearntWord>>;
    fn list_learnt_words(&self) -> RepoResult<Vec<LearntWord>>;
    fn delete_learnt_word(&self, word: &str) -> RepoResult<()>;
    fn insert_learnt_word_if_absent(&self, word: &LearntWord) -> RepoResult<bool>;
    fn count_learnt_words(&self) -> RepoResult<u64>;
}

const UPSERT_KNOWN_SQL: &str = "INSERT INTO known_words (word, level, added_at)
     VALUES (?1, ?2, ?3)
     ON CONFLICT(word) DO UPDATE SET
        level = excluded.level,
        added_at = excluded.added_at;";

const UPSERT_LEARNT_SQL: &str = "INSERT INTO learnt_words (word, learnt_at)
     VALUES (?1, ?2)
     ON CONFLICT(word) DO UPDATE SET learnt_at = excluded.learnt_at;";

impl KnownWordRepository for SqliteStore<'_> {
    fn put_known_word(&self, word: &KnownWord) -> RepoResult<()> {
        upsert_known(self.connection(), word)
    }

    fn bulk_put_known_words(&self, words: &[KnownWord]) -> RepoResult<usize> {
        let tx = self.connection().unchecked_transaction()?;
        for word in words {
            upsert_known(&tx, word)?;
        }
        tx.commit()?;
        Ok(words.len())
    }

    fn get_known_word(&self, word: &str) -> RepoResult<Option<KnownWord>> {
        let key = normalized_key(word)?;
        let found = self
            .connection()
            .query_row(
                "SELECT word, level, added_at FROM known_words WHERE word = ?1;",
                [key.as_str()],
                parse_known_row,
            )
            .optional()?;
        Ok(found)
    }

    fn list_known_words(&self) -> RepoResult<Vec<KnownWord>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT word, level, added_at FROM known_words ORDER BY word ASC;")?;
        let rows = stmt.query_map([], parse_known_row)?;
        let mut words = Vec::new();
        for row in rows {
            words.push(row?);
        }
        Ok(words)
    }

    fn delete_known_word(&self, word: &str) -> RepoResult<()> {
        let key = normalized_key(word)?;
        self.connection()
            .execute("DELETE FROM known_words WHERE word = ?1;", [key.as_str()])?;
        Ok(())
    }

    fn insert_known_word_if_absent(&self, word: &KnownWord) -> RepoResult<bool> {
        let key = normalized_key(&word.word)?;
        let changed = self.connection().execute(
            "INSERT INTO known_words (word, level, added_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(word) DO NOTHING;",
            params![key, word.level.as_deref(), word.added_at],
        )?;
        Ok(changed == 1)
    }

    fn count_known_words(&self) -> RepoResult<u64> {
        count_rows(self.connection(), "known_words")
    }
}

impl LearntWordRepository for SqliteStore<'_> {
    fn put_learnt_word(&self, word: &LearntWord) -> RepoResult<()> {
        upsert_learnt(self.connection(), word)
    }

    fn bulk_put_learnt_words(&self, words: &[LearntWord]) -> RepoResult<usize> {
        let tx = self.connection().unchecked_transaction()?;
        for word in words {
            upsert_learnt(&tx, word)?;
        }
        tx.commit()?;
        Ok(words.len())
    }

    fn get_learnt_word(&self, word: &str) -> RepoResult<Option<LearntWord>> {
        let key = normalized_key(word)?;
        let found = self
            .connection()
            .query_row(
                "SELECT word, learnt_at FROM learnt_words WHERE word = ?1;",
                [key.as_str()],
                parse_learnt_row,
            )
            .optional()?;
        Ok(found)
    }

    fn list_learnt_words(&self) -> RepoResult<Vec<LearntWord>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT word, learnt_at FROM learnt_words ORDER BY word ASC;")?;
        let rows = stmt.query_map([], parse_learnt_row)?;
        let mut words = Vec::new();
        for row in rows {
            words.push(row?);
        }
        Ok(words)
    }

    fn delete_learnt_word(&self, word: &str) -> RepoResult<()> {
        let key = normalized_key(word)?;
        self.connection()
            .execute("DELETE FROM learnt_words WHERE word = ?1;", [key.as_str()])?;
        Ok(())
    }

    fn insert_learnt_word_if_absent(&self, word: &LearntWord) -> RepoResult<bool> {
        let key = normalized_key(&word.word)?;
        let changed = self.connection().execute(
            "INSERT INTO learnt_words (word, learnt_at)
             VALUES (?1, ?2)
             ON CONFLICT(word) DO NOTHING;",
            params![key, word.learnt_at],
        )?;
        Ok(changed == 1)
    }

    fn count_learnt_words(&self) -> RepoResult<u64> {
        count_rows(self.connection(), "learnt_words")
    }
}

fn upsert_known(conn: &Connection, word: &KnownWord) -> RepoResult<()> {
    let key = normalized_key(&word.word)?;
    conn.execute(
        UPSERT_KNOWN_SQL,
        params![key, word.level.as_deref(), word.added_at],
    )?;
    Ok(())
}

fn upsert_learnt(conn: &Connection, word: &LearntWord) -> RepoResult<()> {
    let key = normalized_key(&word.word)?;
    conn.execute(UPSERT_LEARNT_SQL, params![key, word.learnt_at])?;
    Ok(())
}

fn parse_known_row(row: &Row<'_>) -> rusqlite::Result<KnownWord> {
    Ok(KnownWord {
        word: row.get("word")?,
        level: row.get("level")?,
        added_at: row.get("added_at")?,
    })
}

fn parse_learnt_row(row: &Row<'_>) -> rusqlite::Result<LearntWord> {
    Ok(LearntWord {
        word: row.get("word")?,
        learnt_at: row.get("learnt_at")?,
    })
}

pub(crate) fn count_rows(conn: &Connection, table: &'static str) -> RepoResult<u64> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })?;
    Ok(u64::try_from(count).unwrap_or(0))
}
