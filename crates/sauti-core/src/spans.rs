//! Sequential token placement: re-locate each timed word inside a text as a
//! character span.
//!
//! This is the strictest invariant in the engine. Every downstream
//! structural mapping assumes sequential, monotonic token placement, so a
//! word that cannot be found at or after the cursor is a fatal divergence
//! (stale cache, truncated synthesis or a reconciliation bug), never
//! something to patch over.

use crate::error::{Error, Result};
use crate::types::{TokenSpan, Word};

/// Walk `words` in order, finding each word's first occurrence at or after
/// the cursor. Blank or whitespace-only words are skipped without consuming
/// a position.
pub fn locate_words(text: &str, words: &[Word]) -> Result<Vec<TokenSpan>> {
    let mut spans = Vec::with_capacity(words.len());
    let mut cursor = 0usize;

    for word in words {
        let needle = word.word.trim();
        if needle.is_empty() {
            continue;
        }

        // Anchor the search past any whitespace the previous match left.
        while let Some(ch) = text[cursor..].chars().next() {
            if ch.is_whitespace() {
                cursor += ch.len_utf8();
            } else {
                break;
            }
        }

        let found = text[cursor..]
            .find(needle)
            .ok_or_else(|| Error::TokenNotFound {
                word: word.word.clone(),
                index: word.index,
                cursor,
            })?;

        let char_start = cursor + found;
        let char_end = char_start + needle.len();
        spans.push(TokenSpan {
            index: word.index,
            start_ms: word.start_ms,
            end_ms: word.end_ms,
            char_start,
            char_end,
        });
        cursor = char_end;
    }

    Ok(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(index: usize, text: &str, start_ms: u64, end_ms: u64) -> Word {
        Word::new(index, text, start_ms, end_ms)
    }

    #[test]
    fn spans_are_sequential_and_non_overlapping() {
        let text = "Hello world. Goodbye.";
        let words = vec![
            word(0, "Hello", 0, 500),
            word(1, "world.", 500, 1000),
            word(2, "Goodbye.", 1000, 1600),
        ];
        let spans = locate_words(text, &words).expect("locate");
        assert_eq!(spans.len(), 3);
        assert_eq!(&text[spans[0].char_start..spans[0].char_end], "Hello");
        assert_eq!(&text[spans[2].char_start..spans[2].char_end], "Goodbye.");
        for pair in spans.windows(2) {
            assert!(pair[0].char_end <= pair[1].char_start);
        }
    }

    #[test]
    fn repeated_words_advance_the_cursor() {
        let text = "again and again and again";
        let words = vec![
            word(0, "again", 0, 100),
            word(1, "and", 100, 200),
            word(2, "again", 200, 300),
            word(3, "and", 300, 400),
            word(4, "again", 400, 500),
        ];
        let spans = locate_words(text, &words).expect("locate");
        let starts: Vec<_> = spans.iter().map(|s| s.char_start).collect();
        assert_eq!(starts, vec![0, 6, 10, 16, 20]);
    }

    #[test]
    fn blank_words_are_skipped_without_consuming() {
        let text = "one two";
        let words = vec![
            word(0, "one", 0, 100),
            word(1, "  ", 100, 100),
            word(2, "two", 100, 200),
        ];
        let spans = locate_words(text, &words).expect("locate");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].index, 2);
        assert_eq!(&text[spans[1].char_start..spans[1].char_end], "two");
    }

    #[test]
    fn missing_word_is_fatal() {
        let text = "one two three";
        let words = vec![word(0, "one", 0, 100), word(1, "four", 100, 200)];
        let err = locate_words(text, &words).expect_err("must fail");
        match err {
            Error::TokenNotFound { word, index, .. } => {
                assert_eq!(word, "four");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn word_already_consumed_is_fatal() {
        // "two" only appears before the cursor once "three" was matched.
        let text = "one two three";
        let words = vec![
            word(0, "one", 0, 100),
            word(1, "three", 100, 200),
            word(2, "two", 200, 300),
        ];
        assert!(locate_words(text, &words).is_err());
    }
}
