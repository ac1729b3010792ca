//! Reader session use-cases.
//!
//! # Responsibility
//! - Own the `AppState` snapshot together with the local store and the
//!   annotation client.
//! - Resolve annotations in order: memory, local cache, remote service.
//! - Write vocabulary changes through to the store as they happen.
//!
//! # Invariants
//! - The in-memory update is applied even when the matching store write
//!   fails; the failure is logged.
//! - Every state change goes through `reduce`.
//! - Batch results are merged on the calling thread one word at a time.

use crate::client::{AnnotateRequest, AnnotationService, PhraseAnnotateResponse, PhraseRequest};
use crate::config::BatchOptions;
use crate::model::document::{Document, DocumentId};
use crate::model::now_epoch_ms;
use crate::model::word::{normalize_word, CachedAnnotation, KnownWord, LearntWord, WordAnnotation};
use crate::repo::{LocalStore, RepoResult};
use crate::service::backup_service::{seed_known_words, BackupError};
use crate::service::batch::{dispatch, BatchJob, CancelToken};
use crate::state::{reduce, Action, AppState, WordStatus};
use crate::tokenize::first_context_for_word;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Error for single-word annotation lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    EmptyWord,
    /// Remote service reported a failure; the message is the envelope error.
    Annotation(String),
}

impl Display for ReaderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyWord => write!(f, "word cannot be empty"),
            Self::Annotation(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ReaderError {}

/// Where a resolved annotation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationSource {
    Memory,
    Cache,
    Remote,
}

impl AnnotationSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Cache => "cache",
            Self::Remote => "remote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAnnotation {
    pub annotation: WordAnnotation,
    pub source: AnnotationSource,
}

/// Per-word outcome of `annotate_pending`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Words annotated by the remote service.
    pub completed: Vec<String>,
    /// Words served from the local cache without a request.
    pub from_cache: Vec<String>,
    /// Words whose request failed, with the failure message.
    pub failed: Vec<(String, String)>,
    /// Words never requested because the batch was cancelled.
    pub cancelled: Vec<String>,
}

/// Counts restored by `ReaderSession::load`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub known_words: usize,
    pub learnt_words: usize,
    pub annotations: usize,
    pub documents: usize,
}

/// Stateful reader facade over a store and an annotation backend.
pub struct ReaderSession<S: LocalStore, A: AnnotationService> {
    store: S,
    client: A,
    state: AppState,
}

impl<S: LocalStore, A: AnnotationService> ReaderSession<S, A> {
    /// Creates a session with an empty snapshot. Call `load` to restore.
    pub fn new(store: S, client: A) -> Self {
        Self {
            store,
            client,
            state: AppState::default(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn client(&self) -> &A {
        &self.client
    }

    /// Applies one action to the in-memory snapshot only.
    pub fn dispatch(&mut self, action: Action) {
        self.state = reduce(std::mem::take(&mut self.state), action);
    }

    /// Restores vocabulary, annotation cache and saved documents from the
    /// store. The most recently opened document becomes current.
    ///
    /// Cached annotations mark their words unless the user dismissed them.
    pub fn load(&mut self) -> RepoResult<LoadSummary> {
        let known: Vec<String> = self
            .store
            .list_known_words()?
            .into_iter()
            .map(|record| record.word)
            .collect();
        let learnt: Vec<String> = self
            .store
            .list_learnt_words()?
            .into_iter()
            .map(|record| record.word)
            .collect();
        let annotations: Vec<(String, WordAnnotation)> = self
            .store
            .list_annotations()?
            .into_iter()
            .map(|record| (record.word.clone(), record.to_annotation()))
            .collect();
        let dismissed = self.store.list_dismissed_words()?;
        let documents = self.store.list_documents()?;

        let summary = LoadSummary {
            known_words: known.len(),
            learnt_words: learnt.len(),
            annotations: annotations.len(),
            documents: documents.len(),
        };

        self.dispatch(Action::LoadKnownWords(known));
        self.dispatch(Action::LoadLearntWords(learnt));
        self.dispatch(Action::LoadAnnotations(annotations));
        for word in dismissed {
            self.dispatch(Action::UnmarkWord(word));
        }
        for saved in documents.into_iter().rev() {
            self.dispatch(Action::AddDocument(saved.into_document()));
        }

        info!(
            "event=session_load module=reader status=ok known={} learnt={} annotations={} documents={}",
            summary.known_words, summary.learnt_words, summary.annotations, summary.documents
        );
        Ok(summary)
    }

    /// Seeds the known-word set from `json` when the store has none yet.
    /// Returns the number of seeded words.
    pub fn seed_known_words_if_empty(&mut self, json: &str) -> Result<usize, BackupError> {
        if self.store.count_known_words()? > 0 {
            return Ok(0);
        }
        let words = seed_known_words(&self.store, json)?;
        let count = words.len();
        self.dispatch(Action::MergeKnownWords(words));
        Ok(count)
    }

    /// Tokenizes `content` into a new document, saves it and selects it.
    pub fn open_document(
        &mut self,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> DocumentId {
        let now = now_epoch_ms();
        let document = Document::new(title, content, now);
        let id = document.id;
        report_storage("document_save", self.store.save_document(&document.to_saved(now)));
        self.dispatch(Action::AddDocument(document));
        id
    }

    pub fn select_document(&mut self, id: DocumentId) {
        if self.state.document(id).is_none() {
            return;
        }
        report_storage("document_touch", self.store.touch_document(id, now_epoch_ms()));
        self.dispatch(Action::SelectDocument(id));
    }

    pub fn remove_document(&mut self, id: DocumentId) {
        report_storage("document_delete", self.store.delete_document(id));
        self.dispatch(Action::RemoveDocument(id));
    }

    /// Handles a click on a word and returns its new status.
    ///
    /// Unknown words get marked, marked words get unmarked, annotated words
    /// get selected, learnt words go back to unknown and known words are
    /// left alone.
    pub fn click_word(&mut self, word: &str) -> WordStatus {
        let Some(key) = normalize_word(word) else {
            return WordStatus::Unknown;
        };
        match self.state.word_status(&key) {
            WordStatus::Unknown => {
                self.persist_dismissed(&key, false);
                self.dispatch(Action::MarkWord(key.clone()));
            }
            WordStatus::Marked => self.dispatch(Action::UnmarkWord(key.clone())),
            WordStatus::Annotated => self.dispatch(Action::SelectWord(Some(key.clone()))),
            WordStatus::Learnt => self.unmark_learnt(&key),
            WordStatus::Known => {}
        }
        self.state.word_status(&key)
    }

    /// Moves a word to the learnt set.
    pub fn mark_learnt(&mut self, word: &str) {
        let Some(key) = normalize_word(word) else {
            return;
        };
        if self.state.word_status(&key) == WordStatus::Known {
            return;
        }
        let write = LearntWord::new(&key, now_epoch_ms())
            .map_err(Into::into)
            .and_then(|record| self.store.put_learnt_word(&record));
        report_storage("learnt_put", write);
        self.dispatch(Action::AddLearntWord(key));
    }

    /// Removes a word from the learnt set and unmarks it. Its annotation
    /// stays cached.
    pub fn unmark_learnt(&mut self, word: &str) {
        let Some(key) = normalize_word(word) else {
            return;
        };
        report_storage("learnt_delete", self.store.delete_learnt_word(&key));
        self.persist_dismissed(&key, true);
        self.dispatch(Action::RemoveLearntWord(key));
    }

    /// Adds a word to the known set.
    pub fn add_known_word(&mut self, word: &str) {
        let Some(key) = normalize_word(word) else {
            return;
        };
        self.persist_known(&key);
        self.dispatch(Action::AddKnownWord(key));
    }

    /// Drops the word's annotation card and makes the word known.
    pub fn discard_to_known(&mut self, word: &str) {
        let Some(key) = normalize_word(word) else {
            return;
        };
        report_storage("annotation_delete", self.store.delete_annotation(&key));
        self.persist_known(&key);
        self.dispatch(Action::DiscardToKnown(key));
    }

    /// Marks every word of the current document that is neither known nor
    /// learnt.
    pub fn auto_mark(&mut self) {
        self.dispatch(Action::AutoMarkUnknown);
    }

    /// Resolves one word's annotation: memory first, then the local cache,
    /// then the remote service. Remote results are written back to both.
    pub fn annotate_word(&mut self, word: &str) -> Result<ResolvedAnnotation, ReaderError> {
        let key = normalize_word(word).ok_or(ReaderError::EmptyWord)?;

        if let Some(annotation) = self.state.annotations().get(&key) {
            return Ok(ResolvedAnnotation {
                annotation: annotation.clone(),
                source: AnnotationSource::Memory,
            });
        }

        match self.store.get_annotation(&key) {
            Ok(Some(cached)) => {
                let annotation = cached.to_annotation();
                self.persist_dismissed(&key, false);
                self.dispatch(Action::AddAnnotation(key, annotation.clone()));
                return Ok(ResolvedAnnotation {
                    annotation,
                    source: AnnotationSource::Cache,
                });
            }
            Ok(None) => {}
            Err(err) => report_storage::<()>("annotation_get", Err(err)),
        }

        let request = self.request_for(&key);
        let (annotation, _usage) = self
            .client
            .annotate_word(&request)
            .into_result()
            .map_err(ReaderError::Annotation)?;
        cache_annotation(&self.store, &key, &annotation);
        self.dispatch(Action::AddAnnotation(key, annotation.clone()));
        Ok(ResolvedAnnotation {
            annotation,
            source: AnnotationSource::Remote,
        })
    }

    /// Annotates every word of the current document that still lacks one.
    ///
    /// Cache hits are applied without a request. The rest go through the
    /// bounded worker pool; failures are recorded and the batch continues.
    pub fn annotate_pending(
        &mut self,
        options: &BatchOptions,
        cancel: &CancelToken,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let mut jobs = Vec::new();

        for key in self.state.words_pending_annotation() {
            match self.store.get_annotation(&key) {
                Ok(Some(cached)) => {
                    self.dispatch(Action::AddAnnotation(key.clone(), cached.to_annotation()));
                    report.from_cache.push(key);
                    continue;
                }
                Ok(None) => {}
                Err(err) => report_storage::<()>("annotation_get", Err(err)),
            }
            jobs.push(BatchJob {
                request: self.request_for(&key),
                key,
            });
        }

        let Self {
            store,
            client,
            state,
        } = self;
        let (store, client) = (&*store, &*client);
        let cancelled = dispatch(client, jobs, options, cancel, |outcome| {
            match outcome.response.into_result() {
                Ok((annotation, _usage)) => {
                    cache_annotation(store, &outcome.key, &annotation);
                    *state = reduce(
                        std::mem::take(state),
                        Action::AddAnnotation(outcome.key.clone(), annotation),
                    );
                    report.completed.push(outcome.key);
                }
                Err(message) => report.failed.push((outcome.key, message)),
            }
        });
        report.cancelled = cancelled;

        info!(
            "event=annotate_pending module=reader status=done completed={} cached={} failed={} cancelled={}",
            report.completed.len(),
            report.from_cache.len(),
            report.failed.len(),
            report.cancelled.len()
        );
        report
    }

    /// Translates a multi-word selection in its sentence. Not cached.
    pub fn annotate_phrase(&self, phrase: &str, sentence_context: &str) -> PhraseAnnotateResponse {
        let request = PhraseRequest {
            phrase: phrase.trim().to_string(),
            sentence_context: sentence_context.trim().to_string(),
            level: self.state.settings().level,
        };
        self.client.annotate_phrase(&request)
    }

    fn request_for(&self, key: &str) -> AnnotateRequest {
        let context = self
            .state
            .current_document()
            .and_then(|document| first_context_for_word(&document.paragraphs, key))
            .map(str::to_string);
        AnnotateRequest::new(key, self.state.settings().level, context)
    }

    fn persist_dismissed(&self, key: &str, dismissed: bool) {
        report_storage(
            "annotation_dismiss",
            self.store.set_annotation_dismissed(key, dismissed),
        );
    }

    fn persist_known(&self, key: &str) {
        let level = self.state.settings().level.as_str().to_string();
        let write = KnownWord::new(key, Some(level), now_epoch_ms())
            .map_err(Into::into)
            .and_then(|record| self.store.put_known_word(&record));
        report_storage("known_put", write);
        report_storage("learnt_delete", self.store.delete_learnt_word(key));
    }
}

fn cache_annotation<S: LocalStore>(store: &S, key: &str, annotation: &WordAnnotation) {
    let write = CachedAnnotation::from_annotation(key, annotation, now_epoch_ms())
        .map_err(Into::into)
        .and_then(|record| store.put_annotation(&record));
    report_storage("annotation_put", write);
}

fn report_storage<T>(event: &str, result: RepoResult<T>) {
    if let Err(err) = result {
        warn!("event={event} module=reader status=error error={err}");
    }
}
