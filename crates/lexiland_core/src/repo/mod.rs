//! Local store repositories over the reader's SQLite database.
//!
//! # Responsibility
//! - Define one repository contract per record family (known words, learnt
//!   words, annotations, documents).
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Vocabulary keys are normalized before every read and write.
//! - `put` is an upsert (last write wins); `delete` is idempotent.
//! - `insert_*_if_absent` never overwrites an existing record.

pub mod annotation_repo;
pub mod document_repo;
pub mod word_repo;

use crate::db::DbError;
use crate::model::word::{normalize_word, WordValidationError};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use annotation_repo::AnnotationRepository;
pub use document_repo::DocumentRepository;
pub use word_repo::{KnownWordRepository, LearntWordRepository};

pub type RepoResult<T> = Result<T, RepoError>;

const REQUIRED_TABLES: [&str; 4] = ["known_words", "learnt_words", "annotations", "documents"];

/// Repository error for local store persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(WordValidationError),
    Db(DbError),
    NotFound(String),
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(key) => write!(f, "record not found: {key}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "reader store is missing required table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::InvalidData(_) | Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<WordValidationError> for RepoError {
    fn from(value: WordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Every record family the reader persists.
pub trait LocalStore:
    KnownWordRepository + LearntWordRepository + AnnotationRepository + DocumentRepository
{
}

impl<T> LocalStore for T where
    T: KnownWordRepository + LearntWordRepository + AnnotationRepository + DocumentRepository
{
}

/// SQLite-backed local store borrowing a migrated connection.
pub struct SqliteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStore<'conn> {
    /// Wraps a connection after checking that the reader schema is present.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        for table in REQUIRED_TABLES {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn normalized_key(word: &str) -> RepoResult<String> {
    normalize_word(word).ok_or(RepoError::Validation(WordValidationError::EmptyWord))
}
