use lexiland_core::db::open_db_in_memory;
use lexiland_core::repo::{
    AnnotationRepository, DocumentRepository, KnownWordRepository, LearntWordRepository,
};
use lexiland_core::{
    import_all, AnnotateRequest, AnnotateResponse, AnnotationService, AnnotationSource,
    BatchOptions, CancelToken, PhraseAnnotateResponse, PhraseAnnotation, PhraseRequest,
    ReaderError, ReaderSession, SqliteStore, WordAnnotation, WordStatus,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct MockService {
    failing: HashSet<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<AnnotateRequest>>,
}

impl MockService {
    fn failing(words: &[&str]) -> Self {
        Self {
            failing: words.iter().map(|word| word.to_string()).collect(),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AnnotationService for MockService {
    fn annotate_word(&self, request: &AnnotateRequest) -> AnnotateResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.failing.contains(&request.word) {
            return AnnotateResponse::failure("HTTP error! status: 500");
        }
        AnnotateResponse::ok(annotation(&request.word), None)
    }

    fn annotate_phrase(&self, request: &PhraseRequest) -> PhraseAnnotateResponse {
        PhraseAnnotateResponse::ok(
            PhraseAnnotation {
                phrase: request.phrase.clone(),
                chinese: "译文".to_string(),
                explanation: None,
                sentence_context: request.sentence_context.clone(),
            },
            None,
        )
    }
}

fn annotation(word: &str) -> WordAnnotation {
    WordAnnotation {
        word: word.to_string(),
        base_form: None,
        ipa: "/x/".to_string(),
        chinese: "词".to_string(),
        definition: format!("meaning of {word}"),
        example: format!("An example with {word}."),
        level: "B2".to_string(),
        part_of_speech: "noun".to_string(),
    }
}

fn fast_batch() -> BatchOptions {
    BatchOptions::new(2, Duration::ZERO)
}

#[test]
fn resolution_prefers_memory_then_cache_then_remote() {
    let conn = open_db_in_memory().unwrap();
    let mut session = ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());

    let first = session.annotate_word("Dawn").unwrap();
    assert_eq!(first.source, AnnotationSource::Remote);
    assert_eq!(session.client().calls(), 1);
    assert!(session.store().get_annotation("dawn").unwrap().is_some());
    assert_eq!(session.state().word_status("dawn"), WordStatus::Annotated);

    let second = session.annotate_word("dawn").unwrap();
    assert_eq!(second.source, AnnotationSource::Memory);
    assert_eq!(session.client().calls(), 1);

    let mut restarted =
        ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());
    let cached = restarted.annotate_word("dawn").unwrap();
    assert_eq!(cached.source, AnnotationSource::Cache);
    assert_eq!(restarted.client().calls(), 0);
}

#[test]
fn remote_failure_is_returned_and_nothing_is_cached() {
    let conn = open_db_in_memory().unwrap();
    let mut session = ReaderSession::new(
        SqliteStore::try_new(&conn).unwrap(),
        MockService::failing(&["bar"]),
    );

    let err = session.annotate_word("bar").unwrap_err();
    assert_eq!(err, ReaderError::Annotation("HTTP error! status: 500".to_string()));
    assert!(session.store().get_annotation("bar").unwrap().is_none());
    assert_eq!(session.annotate_word("  ").unwrap_err(), ReaderError::EmptyWord);
}

#[test]
fn remote_request_carries_sentence_context_and_level() {
    let conn = open_db_in_memory().unwrap();
    let mut session = ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());
    session.open_document("Story", "It was late. The stranger arrived at dawn.");
    session.dispatch(lexiland_core::Action::SetLevel(lexiland_core::Level::C1));

    session.annotate_word("stranger").unwrap();
    let requests = session.client().requests.lock().unwrap().clone();
    assert_eq!(requests[0].context.as_deref(), Some("The stranger arrived at dawn."));
    assert_eq!(requests[0].level, lexiland_core::Level::C1);
}

#[test]
fn batch_records_failures_and_keeps_going() {
    let conn = open_db_in_memory().unwrap();
    let mut session = ReaderSession::new(
        SqliteStore::try_new(&conn).unwrap(),
        MockService::failing(&["bar"]),
    );
    session.open_document("Words", "foo bar baz");

    let report = session.annotate_pending(&fast_batch(), &CancelToken::new());
    assert_eq!(report.completed.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "bar");
    assert!(report.cancelled.is_empty());

    let annotations = session.state().annotations();
    assert!(annotations.contains_key("foo"));
    assert!(annotations.contains_key("baz"));
    assert!(!annotations.contains_key("bar"));
    assert_eq!(session.store().count_annotations().unwrap(), 2);
}

#[test]
fn batch_uses_cache_and_skips_known_and_learnt_words() {
    let conn = open_db_in_memory().unwrap();
    let mut session = ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());
    session.annotate_word("foo").unwrap();

    let mut fresh = ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());
    fresh.add_known_word("the");
    fresh.mark_learnt("qux");
    fresh.open_document("Words", "The foo met qux and baz.");

    let report = fresh.annotate_pending(&fast_batch(), &CancelToken::new());
    assert_eq!(report.from_cache, vec!["foo"]);
    let mut completed = report.completed.clone();
    completed.sort();
    assert_eq!(completed, vec!["and", "baz", "met"]);
    assert_eq!(fresh.client().calls(), 3);
}

#[test]
fn cancelled_batch_reports_unrequested_words() {
    let conn = open_db_in_memory().unwrap();
    let mut session = ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());
    session.open_document("Words", "one two three");

    let cancel = CancelToken::new();
    cancel.cancel();
    let report = session.annotate_pending(&fast_batch(), &cancel);
    assert_eq!(report.cancelled.len(), 3);
    assert_eq!(session.client().calls(), 0);
}

#[test]
fn known_stays_sticky_across_reimport_and_reload() {
    let conn = open_db_in_memory().unwrap();
    let mut session = ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());
    session.annotate_word("dawn").unwrap();
    let backup = lexiland_core::export_all(session.store()).unwrap();

    session.discard_to_known("dawn");
    assert_eq!(session.state().word_status("dawn"), WordStatus::Known);
    assert!(session.store().get_annotation("dawn").unwrap().is_none());

    let report = import_all(session.store(), &backup).unwrap();
    assert_eq!(report.imported, 1);

    let mut reloaded =
        ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());
    reloaded.load().unwrap();
    assert_eq!(reloaded.state().word_status("dawn"), WordStatus::Known);
    assert!(reloaded.state().annotation("dawn").is_some());
}

#[test]
fn click_cycles_through_statuses() {
    let conn = open_db_in_memory().unwrap();
    let mut session = ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());

    assert_eq!(session.click_word("Harbor"), WordStatus::Marked);
    assert_eq!(session.click_word("harbor"), WordStatus::Unknown);

    session.annotate_word("harbor").unwrap();
    assert_eq!(session.click_word("harbor"), WordStatus::Annotated);
    assert_eq!(session.state().selected_word(), Some("harbor"));

    session.mark_learnt("harbor");
    assert!(session.store().get_learnt_word("harbor").unwrap().is_some());
    assert_eq!(session.click_word("harbor"), WordStatus::Unknown);
    assert!(session.store().get_learnt_word("harbor").unwrap().is_none());
    assert!(session.state().annotation("harbor").is_some());

    session.add_known_word("harbor");
    assert_eq!(session.click_word("harbor"), WordStatus::Known);
    assert!(session.store().get_known_word("harbor").unwrap().is_some());
}

#[test]
fn unlearnt_word_stays_unknown_after_reload() {
    let conn = open_db_in_memory().unwrap();
    let mut session = ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());
    session.annotate_word("harbor").unwrap();
    session.annotate_word("dawn").unwrap();
    session.mark_learnt("harbor");
    assert_eq!(session.click_word("harbor"), WordStatus::Unknown);

    let mut reloaded =
        ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());
    reloaded.load().unwrap();
    assert_eq!(reloaded.state().word_status("harbor"), WordStatus::Unknown);
    assert!(reloaded.state().annotation("harbor").is_some());
    assert_eq!(reloaded.state().word_status("dawn"), WordStatus::Annotated);

    assert_eq!(reloaded.click_word("harbor"), WordStatus::Annotated);
    let mut again = ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());
    again.load().unwrap();
    assert_eq!(again.state().word_status("harbor"), WordStatus::Annotated);
    assert_eq!(again.client().calls(), 0);
}

#[test]
fn storage_failure_still_updates_memory() {
    let conn = open_db_in_memory().unwrap();
    let mut session = ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());
    conn.execute_batch("DROP TABLE annotations; DROP TABLE learnt_words;")
        .unwrap();

    let resolved = session.annotate_word("dawn").unwrap();
    assert_eq!(resolved.source, AnnotationSource::Remote);
    assert!(session.state().annotation("dawn").is_some());

    session.mark_learnt("dawn");
    assert_eq!(session.state().word_status("dawn"), WordStatus::Learnt);
}

#[test]
fn documents_survive_reload_and_latest_is_selected() {
    let conn = open_db_in_memory().unwrap();
    let mut session = ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());
    let first = session.open_document("One", "First text.");
    std::thread::sleep(Duration::from_millis(5));
    let second = session.open_document("Two", "Second text.");
    std::thread::sleep(Duration::from_millis(5));
    session.select_document(first);

    let mut reloaded =
        ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());
    let summary = reloaded.load().unwrap();
    assert_eq!(summary.documents, 2);
    assert_eq!(reloaded.state().current_document_id(), Some(first));

    reloaded.remove_document(first);
    assert_eq!(reloaded.state().current_document_id(), Some(second));
    assert!(reloaded.store().list_documents().unwrap().len() == 1);
}

#[test]
fn seeding_only_happens_on_empty_store() {
    let conn = open_db_in_memory().unwrap();
    let mut session = ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());

    assert_eq!(session.seed_known_words_if_empty(r#"["the", "a"]"#).unwrap(), 2);
    assert_eq!(session.state().word_status("The"), WordStatus::Known);
    assert_eq!(session.seed_known_words_if_empty(r#"["of"]"#).unwrap(), 0);
}

#[test]
fn phrase_annotation_uses_session_level() {
    let conn = open_db_in_memory().unwrap();
    let session = ReaderSession::new(SqliteStore::try_new(&conn).unwrap(), MockService::default());
    let response = session.annotate_phrase(" at dawn ", "We left at dawn.");
    let (phrase, _) = response.into_result().unwrap();
    assert_eq!(phrase.phrase, "at dawn");
    assert_eq!(phrase.sentence_context, "We left at dawn.");
}
