//! Splitting long input for synthesis and merging per-chunk results.
//!
//! Splits prefer structural marker boundaries and never land inside a
//! marker's content; without markers a fixed word-count split applies. Each
//! chunk is synthesized and aligned on its own, so merging is pure
//! bookkeeping: concatenate audio, then shift word indices and timestamps
//! (and anchor token ranges) by the cumulative counts of everything before.

use tracing::debug;

use crate::audio::merge::concat_chunks;
use crate::audio::wav::PcmAudio;
use crate::error::{Error, Result};
use crate::structure::{AnchorInterval, BlockSpec};
use crate::text::tokens::token_offsets;
use crate::types::Word;

/// Synthesis + alignment output for one chunk, in chunk-local coordinates.
#[derive(Debug)]
pub struct ChunkOutcome {
    pub text: String,
    pub audio: PcmAudio,
    pub words: Vec<Word>,
    pub anchors: Vec<AnchorInterval>,
}

/// All chunk outcomes merged back into one coordinate space.
#[derive(Debug)]
pub struct MergedChunks {
    pub text: String,
    pub audio: PcmAudio,
    pub words: Vec<Word>,
    pub anchors: Vec<AnchorInterval>,
}

pub fn needs_chunking(text: &str, max_tokens: usize) -> bool {
    max_tokens > 0 && text.split_whitespace().count() > max_tokens
}

/// Split canonical text into synthesis-sized chunk texts.
pub fn plan_chunks(
    text: &str,
    blocks: &[BlockSpec],
    max_tokens: usize,
    fallback_words: usize,
) -> Vec<String> {
    if !needs_chunking(text, max_tokens) {
        return vec![text.to_string()];
    }

    let segments = if blocks.is_empty() {
        segments_by_word_count(text, fallback_words.max(1))
    } else {
        segments_by_blocks(text, blocks)
    };

    // Greedy packing; a single over-budget segment stays whole rather than
    // being split inside a marker's content.
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;
    for segment in segments {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let segment_tokens = segment.split_whitespace().count();
        if current_tokens > 0 && current_tokens + segment_tokens > max_tokens {
            chunks.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(segment);
        current_tokens += segment_tokens;
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    debug!(chunks = chunks.len(), "planned synthesis chunks");
    if chunks.is_empty() {
        vec![text.to_string()]
    } else {
        chunks
    }
}

/// Slice the text at block starts. Gap text between blocks stays attached to
/// the preceding segment.
fn segments_by_blocks(text: &str, blocks: &[BlockSpec]) -> Vec<String> {
    let mut boundaries: Vec<usize> = blocks
        .iter()
        .map(|b| b.char_start.min(text.len()))
        .filter(|&start| start > 0 && text.is_char_boundary(start))
        .collect();
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut segments = Vec::with_capacity(boundaries.len() + 1);
    let mut prev = 0usize;
    for boundary in boundaries {
        segments.push(text[prev..boundary].to_string());
        prev = boundary;
    }
    segments.push(text[prev..].to_string());
    segments
}

fn segments_by_word_count(text: &str, words_per_segment: usize) -> Vec<String> {
    let offsets = token_offsets(text);
    offsets
        .chunks(words_per_segment)
        .map(|group| {
            let start = group[0].start;
            let end = group[group.len() - 1].end;
            text[start..end].to_string()
        })
        .collect()
}

/// Merge chunk outcomes in order.
pub fn merge_chunks(outcomes: Vec<ChunkOutcome>) -> Result<MergedChunks> {
    if outcomes.is_empty() {
        return Err(Error::ChunkMerge("no chunk outcomes to merge".to_string()));
    }

    let mut texts = Vec::with_capacity(outcomes.len());
    let mut audio_parts = Vec::with_capacity(outcomes.len());
    let mut words = Vec::new();
    let mut anchors = Vec::new();
    let mut word_base = 0usize;
    let mut time_base_ms = 0u64;

    for outcome in outcomes {
        let chunk_duration = outcome.audio.duration_ms();
        let chunk_words = outcome.words.len();

        for word in outcome.words {
            words.push(Word::new(
                word.index + word_base,
                word.word,
                word.start_ms + time_base_ms,
                word.end_ms + time_base_ms,
            ));
        }
        for anchor in outcome.anchors {
            anchors.push(AnchorInterval {
                tok_start: anchor.tok_start + word_base,
                tok_end: anchor.tok_end + word_base,
                html: anchor.html,
                text: anchor.text,
            });
        }

        texts.push(outcome.text);
        audio_parts.push(outcome.audio);
        word_base += chunk_words;
        time_base_ms += chunk_duration;
    }

    Ok(MergedChunks {
        text: texts.join(" "),
        audio: concat_chunks(audio_parts)?,
        words,
        anchors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::BlockKind;

    fn block(id: &str, char_start: usize, char_end: usize) -> BlockSpec {
        BlockSpec {
            kind: BlockKind::Paragraph,
            level: 0,
            id: id.to_string(),
            char_start,
            char_end,
        }
    }

    fn silence(frames: usize) -> PcmAudio {
        PcmAudio {
            samples: vec![0.0; frames],
            sample_rate: 16_000,
            channels: 1,
        }
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = plan_chunks("one two three", &[], 10, 5);
        assert_eq!(chunks, vec!["one two three".to_string()]);
    }

    #[test]
    fn splits_at_block_boundaries() {
        let text = "First paragraph here. Second paragraph here.";
        let blocks = vec![block("p1", 0, 21), block("p2", 22, text.len())];
        let chunks = plan_chunks(text, &blocks, 3, 2);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "First paragraph here.");
        assert_eq!(chunks[1], "Second paragraph here.");
    }

    #[test]
    fn over_budget_block_is_never_split() {
        let text = "one two three four five six.";
        let blocks = vec![block("p1", 0, text.len())];
        let chunks = plan_chunks(text, &blocks, 2, 2);
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn fallback_split_uses_word_count() {
        let text = "a b c d e f g";
        let chunks = plan_chunks(text, &[], 3, 3);
        assert_eq!(chunks, vec!["a b c", "d e f", "g"]);
    }

    #[test]
    fn chunk_texts_rejoin_to_the_original() {
        let text = "a b c d e f g";
        let chunks = plan_chunks(text, &[], 3, 3);
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn merge_shifts_indices_and_timestamps() {
        let first = ChunkOutcome {
            text: "one two".to_string(),
            audio: silence(16_000), // 1000 ms
            words: vec![Word::new(0, "one", 0, 400), Word::new(1, "two", 400, 1000)],
            anchors: Vec::new(),
        };
        let second = ChunkOutcome {
            text: "three four".to_string(),
            audio: silence(8_000), // 500 ms
            words: vec![
                Word::new(0, "three", 0, 250),
                Word::new(1, "four", 250, 500),
            ],
            anchors: vec![AnchorInterval {
                tok_start: 1,
                tok_end: 1,
                html: "<a>four</a>".to_string(),
                text: "four".to_string(),
            }],
        };

        let merged = merge_chunks(vec![first, second]).expect("merge");
        assert_eq!(merged.text, "one two three four");
        assert_eq!(merged.audio.duration_ms(), 1500);

        // Everything that came from chunk two sits after chunk one.
        for word in &merged.words[2..] {
            assert!(word.index >= 2);
            assert!(word.start_ms >= 1000);
        }
        assert_eq!(merged.words[2].word, "three");
        assert_eq!(merged.words[3].index, 3);
        assert_eq!(merged.anchors[0].tok_start, 3);
    }

    #[test]
    fn merging_nothing_is_fatal() {
        assert!(matches!(
            merge_chunks(Vec::new()),
            Err(Error::ChunkMerge(_))
        ));
    }
}
