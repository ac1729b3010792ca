//! Property tests for the tokenizer: offsets, tiling and idempotence.

use lexiland_core::tokenize;
use lexiland_core::{Paragraph, TokenKind};
use proptest::prelude::*;

/// Any text, including newlines, carriage returns and non-ASCII.
fn arbitrary_text() -> impl Strategy<Value = String> {
    prop::string::string_regex("(.|\n|\r\n){0,300}").unwrap()
}

/// Prose paragraphs separated by blank lines.
fn prose() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::string::string_regex("[A-Za-z][A-Za-z ,;'\"é]{0,40}[.!?]?( [A-Z][a-z ]{0,20}[.!?])?")
            .unwrap(),
        1..5,
    )
    .prop_map(|paragraphs| paragraphs.join("\n\n"))
}

fn sentence_texts(paragraphs: &[Paragraph]) -> Vec<String> {
    paragraphs
        .iter()
        .flat_map(|paragraph| paragraph.sentences.iter())
        .map(|sentence| sentence.text.trim().to_string())
        .collect()
}

proptest! {
    #[test]
    fn every_node_slices_its_source(text in arbitrary_text()) {
        for paragraph in tokenize(&text) {
            prop_assert_eq!(&text[paragraph.start..paragraph.end], paragraph.text.as_str());
            for sentence in &paragraph.sentences {
                prop_assert_eq!(&text[sentence.start..sentence.end], sentence.text.as_str());
                for token in &sentence.tokens {
                    prop_assert_eq!(&text[token.start..token.end], token.text.as_str());
                }
            }
        }
    }

    #[test]
    fn tokens_and_sentences_tile_their_parents(text in arbitrary_text()) {
        for paragraph in tokenize(&text) {
            let rebuilt: String = paragraph
                .sentences
                .iter()
                .map(|sentence| sentence.text.as_str())
                .collect();
            prop_assert_eq!(&rebuilt, &paragraph.text);

            for sentence in &paragraph.sentences {
                let rebuilt: String = sentence.tokens.iter().map(|token| token.text.as_str()).collect();
                prop_assert_eq!(&rebuilt, &sentence.text);
            }
        }
    }

    #[test]
    fn paragraphs_are_trimmed_and_ordered(text in arbitrary_text()) {
        let paragraphs = tokenize(&text);
        for pair in paragraphs.windows(2) {
            prop_assert!(pair[0].end <= pair[1].start);
        }
        for paragraph in &paragraphs {
            prop_assert!(!paragraph.text.is_empty());
            prop_assert_eq!(paragraph.text.trim(), paragraph.text.as_str());
        }
    }

    #[test]
    fn whitespace_tokens_contain_only_whitespace(text in arbitrary_text()) {
        for paragraph in tokenize(&text) {
            for token in paragraph.tokens() {
                let all_space = token.text.chars().all(char::is_whitespace);
                prop_assert_eq!(token.kind == TokenKind::Whitespace, all_space);
            }
        }
    }

    #[test]
    fn retokenizing_rejoined_text_is_stable(text in prose()) {
        let first = tokenize(&text);
        let rejoined = first
            .iter()
            .map(|paragraph| paragraph.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let second = tokenize(&rejoined);

        prop_assert_eq!(first.len(), second.len());
        prop_assert_eq!(sentence_texts(&first), sentence_texts(&second));
    }
}
