//! Domain model for reader documents and vocabulary records.
//!
//! # Responsibility
//! - Define the canonical structures shared by tokenizer, store and state.
//! - Keep vocabulary keys normalized in one place.
//!
//! # Invariants
//! - Vocabulary records are keyed by lowercased, trimmed word text.
//! - Persisted timestamps are Unix epoch milliseconds.

pub mod document;
pub mod text;
pub mod word;

use chrono::Utc;

/// Returns the current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}
