//! In-memory reader state and its reducer.
//!
//! # Responsibility
//! - Hold the snapshot the presentation layer renders from: documents,
//!   vocabulary sets, annotations and display settings.
//! - Derive one display status per word instead of re-deriving it at every
//!   call site.
//!
//! # Invariants
//! - Every vocabulary key in the snapshot is normalized.
//! - `current_document_id` is either `None` or names a held document.
//! - A known word is never marked or learnt in the same snapshot.
//! - `reduce` is pure: the same snapshot and action always produce the same
//!   result.

use crate::model::document::{Document, DocumentId};
use crate::model::word::{normalize_word, Level, WordAnnotation};
use crate::tokenize::unique_words;
use std::collections::{HashMap, HashSet};

/// Display status of one word, derived from the vocabulary sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WordStatus {
    Unknown,
    Marked,
    Annotated,
    Learnt,
    Known,
}

/// Reader display toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySettings {
    pub show_ipa: bool,
    pub show_translation: bool,
    pub level: Level,
    /// Marks every unknown word of the current document automatically.
    pub auto_mark: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_ipa: true,
            show_translation: true,
            level: Level::default(),
            auto_mark: false,
        }
    }
}

/// State transitions accepted by `reduce`.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AddDocument(Document),
    SelectDocument(DocumentId),
    RemoveDocument(DocumentId),
    /// Replaces the known-word set.
    LoadKnownWords(Vec<String>),
    MergeKnownWords(Vec<String>),
    AddKnownWord(String),
    LoadLearntWords(Vec<String>),
    AddLearntWord(String),
    /// Un-learns and un-marks the word; its annotation is retained.
    RemoveLearntWord(String),
    MarkWord(String),
    UnmarkWord(String),
    AutoMarkUnknown,
    /// Replaces all annotations, marking their words.
    LoadAnnotations(Vec<(String, WordAnnotation)>),
    AddAnnotation(String, WordAnnotation),
    RemoveAnnotation(String),
    /// Drops the annotation card and moves the word to the known set.
    DiscardToKnown(String),
    SelectWord(Option<String>),
    SetShowIpa(bool),
    SetShowTranslation(bool),
    SetLevel(Level),
    SetAutoMark(bool),
}

/// Immutable-by-convention snapshot of the reader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    documents: Vec<Document>,
    current_document_id: Option<DocumentId>,
    known_words: HashSet<String>,
    learnt_words: HashSet<String>,
    marked_words: HashSet<String>,
    annotations: HashMap<String, WordAnnotation>,
    selected_word: Option<String>,
    settings: DisplaySettings,
}

impl AppState {
    /// Consumes the snapshot and returns the one after `action`.
    pub fn apply(self, action: Action) -> AppState {
        reduce(self, action)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn current_document_id(&self) -> Option<DocumentId> {
        self.current_document_id
    }

    pub fn current_document(&self) -> Option<&Document> {
        let id = self.current_document_id?;
        self.document(id)
    }

    pub fn document(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|document| document.id == id)
    }

    pub fn known_words(&self) -> &HashSet<String> {
        &self.known_words
    }

    pub fn learnt_words(&self) -> &HashSet<String> {
        &self.learnt_words
    }

    pub fn marked_words(&self) -> &HashSet<String> {
        &self.marked_words
    }

    pub fn annotations(&self) -> &HashMap<String, WordAnnotation> {
        &self.annotations
    }

    pub fn annotation(&self, word: &str) -> Option<&WordAnnotation> {
        normalize_word(word).and_then(|key| self.annotations.get(&key))
    }

    pub fn selected_word(&self) -> Option<&str> {
        self.selected_word.as_deref()
    }

    pub fn settings(&self) -> DisplaySettings {
        self.settings
    }

    /// Derives the single display status for `word`.
    pub fn word_status(&self, word: &str) -> WordStatus {
        let Some(key) = normalize_word(word) else {
            return WordStatus::Unknown;
        };

        if self.known_words.contains(&key) {
            WordStatus::Known
        } else if self.learnt_words.contains(&key) {
            WordStatus::Learnt
        } else if self.marked_words.contains(&key) {
            if self.annotations.contains_key(&key) {
                WordStatus::Annotated
            } else {
                WordStatus::Marked
            }
        } else {
            WordStatus::Unknown
        }
    }

    /// Words of the current document that still need an annotation: not
    /// known, not learnt and without one in memory.
    pub fn words_pending_annotation(&self) -> Vec<String> {
        let Some(document) = self.current_document() else {
            return Vec::new();
        };
        unique_words(&document.paragraphs)
            .into_iter()
            .filter(|word| {
                !self.known_words.contains(word)
                    && !self.learnt_words.contains(word)
                    && !self.annotations.contains_key(word)
            })
            .collect()
    }
}

/// Applies `action` to `state` and returns the next snapshot.
pub fn reduce(mut state: AppState, action: Action) -> AppState {
    match action {
        Action::AddDocument(document) => {
            state.current_document_id = Some(document.id);
            state.documents.retain(|existing| existing.id != document.id);
            state.documents.push(document);
            auto_mark_if_enabled(&mut state);
        }
        Action::SelectDocument(id) => {
            if state.document(id).is_some() {
                state.current_document_id = Some(id);
                auto_mark_if_enabled(&mut state);
            }
        }
        Action::RemoveDocument(id) => {
            state.documents.retain(|document| document.id != id);
            if state.current_document_id == Some(id) {
                state.current_document_id = state.documents.last().map(|document| document.id);
            }
        }
        Action::LoadKnownWords(words) => {
            state.known_words = normalize_all(words);
            forget_known(&mut state);
        }
        Action::MergeKnownWords(words) => {
            state.known_words.extend(normalize_all(words));
            forget_known(&mut state);
        }
        Action::AddKnownWord(word) => {
            if let Some(key) = normalize_word(&word) {
                state.known_words.insert(key);
                forget_known(&mut state);
            }
        }
        Action::LoadLearntWords(words) => {
            state.learnt_words = normalize_all(words);
            state
                .learnt_words
                .retain(|word| !state.known_words.contains(word));
        }
        Action::AddLearntWord(word) => {
            if let Some(key) = unknown_key(&state, &word) {
                state.learnt_words.insert(key);
            }
        }
        Action::RemoveLearntWord(word) => {
            if let Some(key) = normalize_word(&word) {
                state.learnt_words.remove(&key);
                state.marked_words.remove(&key);
            }
        }
        Action::MarkWord(word) => {
            if let Some(key) = unknown_key(&state, &word) {
                state.marked_words.insert(key);
            }
        }
        Action::UnmarkWord(word) => {
            if let Some(key) = normalize_word(&word) {
                state.marked_words.remove(&key);
            }
        }
        Action::AutoMarkUnknown => auto_mark_current(&mut state),
        Action::LoadAnnotations(entries) => {
            state.annotations.clear();
            for (word, annotation) in entries {
                insert_annotation(&mut state, &word, annotation);
            }
        }
        Action::AddAnnotation(word, annotation) => {
            insert_annotation(&mut state, &word, annotation);
        }
        Action::RemoveAnnotation(word) => {
            if let Some(key) = normalize_word(&word) {
                state.annotations.remove(&key);
            }
        }
        Action::DiscardToKnown(word) => {
            if let Some(key) = normalize_word(&word) {
                state.annotations.remove(&key);
                if state.selected_word.as_deref() == Some(key.as_str()) {
                    state.selected_word = None;
                }
                state.known_words.insert(key);
                forget_known(&mut state);
            }
        }
        Action::SelectWord(word) => {
            state.selected_word = word.and_then(|word| normalize_word(&word));
        }
        Action::SetShowIpa(show) => state.settings.show_ipa = show,
        Action::SetShowTranslation(show) => state.settings.show_translation = show,
        Action::SetLevel(level) => state.settings.level = level,
        Action::SetAutoMark(enabled) => {
            state.settings.auto_mark = enabled;
            auto_mark_if_enabled(&mut state);
        }
    }
    state
}

fn normalize_all(words: Vec<String>) -> HashSet<String> {
    words
        .iter()
        .filter_map(|word| normalize_word(word))
        .collect()
}

fn unknown_key(state: &AppState, word: &str) -> Option<String> {
    normalize_word(word).filter(|key| !state.known_words.contains(key))
}

fn forget_known(state: &mut AppState) {
    let known = &state.known_words;
    state.marked_words.retain(|word| !known.contains(word));
    state.learnt_words.retain(|word| !known.contains(word));
}

fn insert_annotation(state: &mut AppState, word: &str, annotation: WordAnnotation) {
    let Some(key) = normalize_word(word) else {
        return;
    };
    if !state.known_words.contains(&key) {
        state.marked_words.insert(key.clone());
    }
    state.annotations.insert(key, annotation);
}

fn auto_mark_if_enabled(state: &mut AppState) {
    if state.settings.auto_mark {
        auto_mark_current(state);
    }
}

fn auto_mark_current(state: &mut AppState) {
    let Some(document) = state.current_document() else {
        return;
    };
    let candidates: Vec<String> = unique_words(&document.paragraphs)
        .into_iter()
        .filter(|word| !state.known_words.contains(word) && !state.learnt_words.contains(word))
        .collect();
    state.marked_words.extend(candidates);
}

#[cfg(test)]
mod tests {
    use super::{reduce, Action, AppState, WordStatus};
    use crate::model::document::Document;
    use crate::model::word::{Level, WordAnnotation};

    fn annotation(word: &str) -> WordAnnotation {
        WordAnnotation {
            word: word.to_string(),
            base_form: None,
            ipa: "/x/".to_string(),
            chinese: "x".to_string(),
            definition: "x".to_string(),
            example: format!("An example with {word}."),
            level: "B2".to_string(),
            part_of_speech: "noun".to_string(),
        }
    }

    fn apply_all(actions: Vec<Action>) -> AppState {
        actions.into_iter().fold(AppState::default(), reduce)
    }

    #[test]
    fn word_walks_through_the_display_lifecycle() {
        let mut state = apply_all(vec![Action::MarkWord("Stranger".to_string())]);
        assert_eq!(state.word_status("stranger"), WordStatus::Marked);

        state = reduce(state, Action::AddAnnotation("stranger".to_string(), annotation("stranger")));
        assert_eq!(state.word_status("STRANGER"), WordStatus::Annotated);

        state = reduce(state, Action::AddLearntWord("stranger".to_string()));
        assert_eq!(state.word_status("stranger"), WordStatus::Learnt);

        state = reduce(state, Action::RemoveLearntWord("stranger".to_string()));
        assert_eq!(state.word_status("stranger"), WordStatus::Unknown);
        assert!(state.annotation("stranger").is_some());

        state = reduce(state, Action::MarkWord("stranger".to_string()));
        assert_eq!(state.word_status("stranger"), WordStatus::Annotated);

        state = reduce(state, Action::DiscardToKnown("stranger".to_string()));
        assert_eq!(state.word_status("stranger"), WordStatus::Known);
        assert!(state.annotation("stranger").is_none());
    }

    #[test]
    fn known_words_cannot_be_marked_or_reannotated_into_view() {
        let state = apply_all(vec![
            Action::AddKnownWord("dawn".to_string()),
            Action::MarkWord("dawn".to_string()),
            Action::AddAnnotation("dawn".to_string(), annotation("dawn")),
        ]);
        assert_eq!(state.word_status("dawn"), WordStatus::Known);
        assert!(!state.marked_words().contains("dawn"));
    }

    #[test]
    fn adding_document_selects_it_and_auto_marks_when_enabled() {
        let document = Document::new("Sample", "The stranger arrived at dawn.", 1);
        let id = document.id;
        let state = apply_all(vec![
            Action::LoadKnownWords(vec!["the".into(), "at".into()]),
            Action::SetAutoMark(true),
            Action::AddDocument(document),
        ]);
        assert_eq!(state.current_document_id(), Some(id));
        assert_eq!(state.word_status("stranger"), WordStatus::Marked);
        assert_eq!(state.word_status("the"), WordStatus::Known);
        assert_eq!(state.words_pending_annotation(), vec!["stranger", "arrived", "dawn"]);
    }

    #[test]
    fn removing_current_document_falls_back_to_last_remaining() {
        let first = Document::new("One", "First.", 1);
        let second = Document::new("Two", "Second.", 2);
        let first_id = first.id;
        let second_id = second.id;
        let state = apply_all(vec![
            Action::AddDocument(first),
            Action::AddDocument(second),
            Action::RemoveDocument(second_id),
        ]);
        assert_eq!(state.current_document_id(), Some(first_id));
        let state = reduce(state, Action::RemoveDocument(first_id));
        assert!(state.current_document().is_none());
    }

    #[test]
    fn selecting_unknown_document_is_ignored() {
        let document = Document::new("One", "First.", 1);
        let id = document.id;
        let state = apply_all(vec![
            Action::AddDocument(document),
            Action::SelectDocument(uuid::Uuid::new_v4()),
        ]);
        assert_eq!(state.current_document_id(), Some(id));
    }

    #[test]
    fn display_toggles_update_settings() {
        let state = apply_all(vec![
            Action::SetShowIpa(false),
            Action::SetShowTranslation(false),
            Action::SetLevel(Level::C1),
        ]);
        let settings = state.settings();
        assert!(!settings.show_ipa);
        assert!(!settings.show_translation);
        assert_eq!(settings.level, Level::C1);
    }
}
