//! Core data model shared across the engine.

use serde::{Deserialize, Serialize};

/// A single timed word as persisted in the sidecar.
///
/// `start_ms`/`end_ms` form a `[start, end)` interval. Across a sequence the
/// starts are non-decreasing and `index` is a dense 0-based sequence in
/// emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub index: usize,
    pub word: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl Word {
    pub fn new(index: usize, word: impl Into<String>, start_ms: u64, end_ms: u64) -> Self {
        Self {
            index,
            word: word.into(),
            start_ms,
            end_ms,
        }
    }
}

/// A candidate word-timing sequence produced by one alignment source.
///
/// `duration_ms` bounds every word's `end_ms`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentResult {
    pub words: Vec<Word>,
    pub duration_ms: u64,
    pub source: &'static str,
}

/// A timed word re-located inside a specific text as a half-open byte range.
///
/// Spans are strictly increasing and non-overlapping; span `i` begins no
/// earlier than span `i - 1` ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpan {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub char_start: usize,
    pub char_end: usize,
}
