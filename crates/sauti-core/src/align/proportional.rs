//! Last-resort aligner: distribute the known duration over canonical tokens
//! by character length.

use async_trait::async_trait;
use tracing::debug;

use crate::align::AlignmentBackend;
use crate::audio::wav::PcmAudio;
use crate::error::Result;
use crate::text::canonical::CanonicalText;
use crate::types::{AlignmentResult, Word};

pub struct ProportionalAligner;

/// Build a proportional timing for `text` over `duration_ms`. Exposed for
/// chunk-local use; succeeds whenever the duration is positive.
pub fn distribute(text: &str, duration_ms: u64) -> Option<AlignmentResult> {
    if duration_ms == 0 {
        return None;
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let total_chars: usize = tokens.iter().map(|t| t.chars().count()).sum();
    let total_chars = total_chars.max(1) as u64;

    let mut words = Vec::with_capacity(tokens.len());
    let mut consumed_chars = 0u64;
    for (index, token) in tokens.iter().enumerate() {
        let start_ms = duration_ms * consumed_chars / total_chars;
        consumed_chars += token.chars().count() as u64;
        let end_ms = (duration_ms * consumed_chars / total_chars).min(duration_ms);
        words.push(Word::new(index, *token, start_ms, end_ms.max(start_ms)));
    }

    Some(AlignmentResult {
        words,
        duration_ms,
        source: "proportional",
    })
}

#[async_trait]
impl AlignmentBackend for ProportionalAligner {
    fn name(&self) -> &'static str {
        "proportional"
    }

    fn requires_projection(&self) -> bool {
        // Already one slot per canonical token, labelled with canonical text.
        false
    }

    async fn align(
        &self,
        audio: &PcmAudio,
        text: &CanonicalText,
        _language: Option<&str>,
    ) -> Result<Option<AlignmentResult>> {
        let duration_ms = audio.duration_ms();
        let result = distribute(text.text(), duration_ms);
        if result.is_none() {
            debug!(duration_ms, "proportional aligner declined");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_follows_character_share() {
        let result = distribute("ab cdef", 600).expect("distribute");
        // "ab" is 2 of 6 chars, "cdef" the remaining 4.
        assert_eq!(result.words[0].start_ms, 0);
        assert_eq!(result.words[0].end_ms, 200);
        assert_eq!(result.words[1].start_ms, 200);
        assert_eq!(result.words[1].end_ms, 600);
    }

    #[test]
    fn starts_are_non_decreasing_and_bounded() {
        let result = distribute("one two three four five", 1234).expect("distribute");
        let mut prev = 0;
        for word in &result.words {
            assert!(word.start_ms >= prev);
            assert!(word.end_ms >= word.start_ms);
            assert!(word.end_ms <= result.duration_ms);
            prev = word.start_ms;
        }
    }

    #[test]
    fn zero_duration_declines() {
        assert!(distribute("hello", 0).is_none());
    }

    #[test]
    fn indices_are_dense() {
        let result = distribute("a b c", 300).expect("distribute");
        let indices: Vec<_> = result.words.iter().map(|w| w.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
