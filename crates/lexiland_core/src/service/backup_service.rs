//! Export, import and seeding of vocabulary data.
//!
//! # Responsibility
//! - Serialize known words, learnt words and cached annotations into the
//!   versioned backup format.
//! - Merge a backup into the local store without overwriting local records.
//! - Bootstrap the known-word set from a static seed list.
//!
//! # Invariants
//! - Import validates `version` and `data` before touching the store.
//! - Import never overwrites: an existing key is counted as skipped.
//! - A failing record is reported in `errors` and does not stop the import.
//! - Already-merged records stay merged if a later record fails.

use crate::model::now_epoch_ms;
use crate::model::word::{normalize_word, CachedAnnotation, KnownWord, LearntWord};
use crate::repo::{AnnotationRepository, KnownWordRepository, LearntWordRepository, RepoError};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// Error for whole-call backup failures. Per-record import failures are
/// reported through `ImportReport::errors` instead.
#[derive(Debug)]
pub enum BackupError {
    /// Input is not JSON or lacks the required top-level fields.
    InvalidFormat(String),
    Repo(RepoError),
    Serialize(serde_json::Error),
    InvalidTimestamp { word: String, value: i64 },
}

impl Display for BackupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat(message) => write!(f, "failed to parse import data: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Serialize(err) => write!(f, "failed to serialize export: {err}"),
            Self::InvalidTimestamp { word, value } => {
                write!(f, "record `{word}` has out-of-range timestamp {value}")
            }
        }
    }
}

impl Error for BackupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Serialize(err) => Some(err),
            Self::InvalidFormat(_) | Self::InvalidTimestamp { .. } => None,
        }
    }
}

impl From<RepoError> for BackupError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Top-level backup document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFile {
    pub exported_at: String,
    pub version: String,
    pub data: ExportData,
    pub statistics: ExportStatistics,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub known_words: Vec<ExportedKnownWord>,
    pub learnt_words: Vec<ExportedLearntWord>,
    pub annotations: Vec<ExportedAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportStatistics {
    pub total_known_words: usize,
    pub total_learnt_words: usize,
    pub total_annotations: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedKnownWord {
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    pub added_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedLearntWord {
    pub word: String,
    pub learnt_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedAnnotation {
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_form: Option<String>,
    pub ipa: String,
    pub chinese: String,
    pub definition: String,
    pub example: String,
    pub level: String,
    pub part_of_speech: String,
    pub cached_at: String,
}

/// Merge summary returned by `import_all`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// Builds the backup document from the current store snapshot.
pub fn export_snapshot<S>(store: &S) -> Result<ExportFile, BackupError>
where
    S: KnownWordRepository + LearntWordRepository + AnnotationRepository,
{
    let known = store.list_known_words()?;
    let learnt = store.list_learnt_words()?;
    let annotations = store.list_annotations()?;

    let mut data = ExportData::default();
    for word in known {
        data.known_words.push(ExportedKnownWord {
            added_at: to_iso(&word.word, word.added_at)?,
            word: word.word,
            level: word.level,
        });
    }
    for word in learnt {
        data.learnt_words.push(ExportedLearntWord {
            learnt_at: to_iso(&word.word, word.learnt_at)?,
            word: word.word,
        });
    }
    for annotation in annotations {
        data.annotations.push(ExportedAnnotation {
            cached_at: to_iso(&annotation.word, annotation.cached_at)?,
            word: annotation.word,
            base_form: annotation.base_form,
            ipa: annotation.ipa,
            chinese: annotation.chinese,
            definition: annotation.definition,
            example: annotation.example,
            level: annotation.level,
            part_of_speech: annotation.part_of_speech,
        });
    }

    let statistics = ExportStatistics {
        total_known_words: data.known_words.len(),
        total_learnt_words: data.learnt_words.len(),
        total_annotations: data.annotations.len(),
    };

    Ok(ExportFile {
        exported_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        version: EXPORT_FORMAT_VERSION.to_string(),
        data,
        statistics,
    })
}

/// Serializes the store snapshot as pretty-printed backup JSON.
pub fn export_all<S>(store: &S) -> Result<String, BackupError>
where
    S: KnownWordRepository + LearntWordRepository + AnnotationRepository,
{
    let snapshot = export_snapshot(store)?;
    let json = serde_json::to_string_pretty(&snapshot).map_err(BackupError::Serialize)?;
    info!(
        "event=export_all module=backup status=ok known={} learnt={} annotations={}",
        snapshot.statistics.total_known_words,
        snapshot.statistics.total_learnt_words,
        snapshot.statistics.total_annotations
    );
    Ok(json)
}

/// Merges backup JSON into the store.
///
/// # Errors
/// - `BackupError::InvalidFormat` when the input is not JSON, `version` is
///   not a non-empty string or `data` is not an object. Nothing has been
///   merged in that case.
pub fn import_all<S>(store: &S, json: &str) -> Result<ImportReport, BackupError>
where
    S: KnownWordRepository + LearntWordRepository + AnnotationRepository,
{
    let root: Value =
        serde_json::from_str(json).map_err(|err| BackupError::InvalidFormat(err.to_string()))?;
    let version = root.get("version").and_then(Value::as_str);
    let data = root.get("data").filter(|data| data.is_object());
    let (Some(version), Some(data)) = (version, data) else {
        return Err(BackupError::InvalidFormat("Invalid data format".to_string()));
    };
    if version.trim().is_empty() {
        return Err(BackupError::InvalidFormat("Invalid data format".to_string()));
    }

    let mut report = ImportReport::default();

    for item in records(data, "knownWords") {
        let outcome = decode::<ExportedKnownWord>(item).and_then(|record| {
            let added_at = from_iso(&record.added_at)?;
            let word = KnownWord::new(&record.word, record.level, added_at)
                .map_err(|err| err.to_string())?;
            store
                .insert_known_word_if_absent(&word)
                .map_err(|err| err.to_string())
        });
        tally(&mut report, "Known word", item, outcome);
    }

    for item in records(data, "learntWords") {
        let outcome = decode::<ExportedLearntWord>(item).and_then(|record| {
            let learnt_at = from_iso(&record.learnt_at)?;
            let word = LearntWord::new(&record.word, learnt_at).map_err(|err| err.to_string())?;
            store
                .insert_learnt_word_if_absent(&word)
                .map_err(|err| err.to_string())
        });
        tally(&mut report, "Learnt word", item, outcome);
    }

    for item in records(data, "annotations") {
        let outcome = decode::<ExportedAnnotation>(item).and_then(|record| {
            let cached_at = from_iso(&record.cached_at)?;
            let word = normalize_word(&record.word).ok_or("word cannot be empty")?;
            let annotation = CachedAnnotation {
                word,
                base_form: record.base_form,
                ipa: record.ipa,
                chinese: record.chinese,
                definition: record.definition,
                example: record.example,
                level: record.level,
                part_of_speech: record.part_of_speech,
                cached_at,
            };
            store
                .insert_annotation_if_absent(&annotation)
                .map_err(|err| err.to_string())
        });
        tally(&mut report, "Annotation", item, outcome);
    }

    if report.errors.is_empty() {
        info!(
            "event=import_all module=backup status=ok imported={} skipped={}",
            report.imported, report.skipped
        );
    } else {
        warn!(
            "event=import_all module=backup status=partial imported={} skipped={} errors={}",
            report.imported,
            report.skipped,
            report.errors.len()
        );
    }

    Ok(report)
}

/// Parses a known-word seed list: a JSON array of strings or `{"words": [...]}`.
pub fn parse_known_words_seed(json: &str) -> Result<Vec<String>, BackupError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SeedFile {
        List(Vec<String>),
        Wrapped {
            #[serde(default)]
            words: Vec<String>,
        },
    }

    let parsed: SeedFile =
        serde_json::from_str(json).map_err(|err| BackupError::InvalidFormat(err.to_string()))?;
    let words = match parsed {
        SeedFile::List(words) | SeedFile::Wrapped { words } => words,
    };
    Ok(words.iter().filter_map(|word| normalize_word(word)).collect())
}

/// Upserts seed words into the known-word set and returns them.
pub fn seed_known_words<S>(store: &S, json: &str) -> Result<Vec<String>, BackupError>
where
    S: KnownWordRepository,
{
    let words = parse_known_words_seed(json)?;
    let added_at = now_epoch_ms();
    let records = words
        .iter()
        .map(|word| KnownWord::new(word, None, added_at))
        .collect::<Result<Vec<_>, _>>()
        .map_err(RepoError::from)?;
    let written = store.bulk_put_known_words(&records)?;
    info!("event=seed_known_words module=backup status=ok count={written}");
    Ok(words)
}

fn records<'a>(data: &'a Value, family: &str) -> impl Iterator<Item = &'a Value> {
    data.get(family)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn decode<T: DeserializeOwned>(item: &Value) -> Result<T, String> {
    T::deserialize(item).map_err(|err| err.to_string())
}

fn tally(report: &mut ImportReport, label: &str, item: &Value, outcome: Result<bool, String>) {
    match outcome {
        Ok(true) => report.imported += 1,
        Ok(false) => report.skipped += 1,
        Err(message) => {
            let word = item
                .get("word")
                .and_then(Value::as_str)
                .unwrap_or("<missing word>");
            report.errors.push(format!("{label} \"{word}\": {message}"));
        }
    }
}

fn to_iso(word: &str, epoch_ms: i64) -> Result<String, BackupError> {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .map(|value| value.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| BackupError::InvalidTimestamp {
            word: word.to_string(),
            value: epoch_ms,
        })
}

fn from_iso(value: &str) -> Result<i64, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.timestamp_millis())
        .map_err(|err| format!("invalid timestamp `{value}`: {err}"))
}
