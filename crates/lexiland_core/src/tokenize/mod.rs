//! Paragraph / sentence / token segmentation with absolute byte offsets.
//!
//! # Responsibility
//! - Split raw document text into a three-level tree.
//! - Carry source offsets through every split step (no re-search).
//!
//! # Invariants
//! - Every node satisfies `node.text == source[node.start..node.end]`.
//! - Sentences tile their paragraph and tokens tile their sentence.
//! - Total over all inputs: never panics, empty input yields no paragraphs.

use crate::model::text::{Paragraph, Sentence, Token, TokenKind};
use once_cell::sync::Lazy;
use regex::{Match, Regex};
use std::collections::HashSet;
use std::ops::Range;

static PARAGRAPH_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\r?\n){2,}").expect("valid paragraph break regex"));
static UPPERCASE_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[A-Z]").expect("valid uppercase line regex"));
static SENTENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.!?]*[.!?]+").expect("valid sentence regex"));
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+(?:'\w+)?)|([^\w\s])|(\s+)").expect("valid token regex"));

/// Tokenizes document text into paragraphs, sentences and tokens.
pub fn tokenize(text: &str) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();

    for (segment_start, segment) in split_paragraph_segments(text) {
        let trimmed = segment.trim();
        if trimmed.is_empty() {
            continue;
        }

        let start = segment_start + (segment.len() - segment.trim_start().len());
        let end = start + trimmed.len();
        let id = format!("p{}", paragraphs.len());
        let sentences = tokenize_sentences(trimmed, start, &id);

        paragraphs.push(Paragraph {
            id,
            text: trimmed.to_string(),
            sentences,
            start,
            end,
        });
    }

    paragraphs
}

/// Splits one paragraph into sentences.
///
/// `base` is the absolute offset of `text` inside the source document.
pub fn tokenize_sentences(text: &str, base: usize, paragraph_id: &str) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut cursor = 0;

    for found in SENTENCE_RE.find_iter(text) {
        // Start at the cursor so no byte is left between two sentences.
        let range = cursor.min(found.start())..found.end();
        push_sentence(&mut sentences, text, range, base, paragraph_id);
        cursor = found.end();
    }

    if cursor < text.len() && !text[cursor..].trim().is_empty() {
        push_sentence(&mut sentences, text, cursor..text.len(), base, paragraph_id);
    }

    sentences
}

/// Splits one sentence into word, punctuation and whitespace tokens.
pub fn tokenize_words(text: &str, base: usize, sentence_id: &str) -> Vec<Token> {
    TOKEN_RE
        .captures_iter(text)
        .enumerate()
        .filter_map(|(index, caps)| {
            let (kind, found) = if let Some(found) = caps.get(1) {
                (TokenKind::Word, found)
            } else if let Some(found) = caps.get(2) {
                (TokenKind::Punctuation, found)
            } else {
                (TokenKind::Whitespace, caps.get(3)?)
            };

            Some(Token {
                id: format!("{sentence_id}-t{index}"),
                kind,
                text: found.as_str().to_string(),
                start: base + found.start(),
                end: base + found.end(),
            })
        })
        .collect()
}

/// Case-insensitive membership check against a lowercased known set.
pub fn is_known_word(word: &str, known: &HashSet<String>) -> bool {
    known.contains(&word.to_lowercase())
}

/// Returns lowercased word keys in first-seen order.
pub fn unique_words(paragraphs: &[Paragraph]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut words = Vec::new();
    for token in paragraphs.iter().flat_map(Paragraph::tokens) {
        if let Some(key) = token.word_key() {
            if seen.insert(key.clone()) {
                words.push(key);
            }
        }
    }
    words
}

/// Returns the trimmed text of the sentence containing `offset`.
pub fn sentence_context(paragraphs: &[Paragraph], offset: usize) -> Option<&str> {
    paragraphs
        .iter()
        .filter(|paragraph| paragraph.start <= offset && offset < paragraph.end)
        .flat_map(|paragraph| paragraph.sentences.iter())
        .find(|sentence| sentence.start <= offset && offset < sentence.end)
        .map(Sentence::trimmed_text)
}

/// Returns the trimmed text of the first sentence containing `word`
/// (case-insensitive), used as annotation context.
pub fn first_context_for_word<'a>(paragraphs: &'a [Paragraph], word: &str) -> Option<&'a str> {
    let key = word.to_lowercase();
    paragraphs
        .iter()
        .flat_map(|paragraph| paragraph.sentences.iter())
        .find(|sentence| {
            sentence
                .words()
                .any(|token| token.text.to_lowercase() == key)
        })
        .map(Sentence::trimmed_text)
}

fn split_paragraph_segments(text: &str) -> Vec<(usize, &str)> {
    let segments = split_keeping_offsets(text, &PARAGRAPH_BREAK_RE, |found| found.range());
    if segments.len() == 1 {
        // Single-newline prose: break before lines starting with a capital.
        return split_keeping_offsets(text, &UPPERCASE_LINE_RE, |found| {
            found.start()..found.start() + 1
        });
    }
    segments
}

fn split_keeping_offsets<'t>(
    text: &'t str,
    separator: &Regex,
    separator_range: impl Fn(&Match<'t>) -> Range<usize>,
) -> Vec<(usize, &'t str)> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    for found in separator.find_iter(text) {
        let range = separator_range(&found);
        segments.push((cursor, &text[cursor..range.start]));
        cursor = range.end;
    }
    segments.push((cursor, &text[cursor..]));
    segments
}

fn push_sentence(
    sentences: &mut Vec<Sentence>,
    paragraph_text: &str,
    range: Range<usize>,
    base: usize,
    paragraph_id: &str,
) {
    let slice = &paragraph_text[range.clone()];
    let id = format!("{paragraph_id}-s{}", sentences.len());
    let start = base + range.start;
    let tokens = tokenize_words(slice, start, &id);
    sentences.push(Sentence {
        id,
        text: slice.to_string(),
        tokens,
        start,
        end: base + range.end,
    });
}
