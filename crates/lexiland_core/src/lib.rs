//! Core logic for the LexiLand reader.
//! Tokenization, vocabulary storage, annotation lookup and reader state live
//! here; front ends only render and dispatch.

pub mod client;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod state;
pub mod tokenize;

pub use client::{
    AnnotateRequest, AnnotateResponse, AnnotationService, HttpAnnotationClient, PhraseAnnotation,
    PhraseAnnotateResponse, PhraseRequest, ServiceResponse, Usage,
};
pub use config::{BatchOptions, ClientConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::document::{Document, DocumentId, SavedDocument};
pub use model::text::{Paragraph, Sentence, Token, TokenKind};
pub use model::word::{CachedAnnotation, KnownWord, LearntWord, Level, WordAnnotation};
pub use repo::{LocalStore, RepoError, RepoResult, SqliteStore};
pub use service::backup_service::{export_all, import_all, BackupError, ImportReport};
pub use service::batch::CancelToken;
pub use service::reader_service::{AnnotationSource, BatchReport, ReaderError, ReaderSession};
pub use state::{reduce, Action, AppState, DisplaySettings, WordStatus};
pub use tokenize::tokenize;

/// Health-check probe for front ends.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
