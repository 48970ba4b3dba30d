//! The persisted timing sidecar and its validity rules.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::write_atomic;
use crate::error::Result;
use crate::html::HtmlStats;
use crate::structure::{AnchorInterval, Block};
use crate::types::Word;

/// Bumped whenever the HTML-reconstruction contract changes, forcing stale
/// sidecars to rebuild.
pub const ALIGNMENT_VERSION: u32 = 3;

/// Min/max timing over the tokens one structural marker covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderTiming {
    pub id: String,
    pub kind: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// The persisted artifact stored next to each audio asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarMetadata {
    pub section_id: String,
    pub voice: String,
    pub tts_model: String,
    #[serde(default)]
    pub transcription_model: Option<String>,
    pub text_hash: String,
    pub tts_text: String,
    pub duration_ms: u64,
    pub reading_time_s: f64,
    pub words_per_minute: f64,
    pub words: Vec<Word>,
    #[serde(default)]
    pub placeholders_timing: Vec<PlaceholderTiming>,
    pub alignment_version: u32,
    pub tts_html: String,
    pub tts_html_body: String,
    pub tts_css: String,
    pub tts_html_stats: HtmlStats,
}

impl SidecarMetadata {
    /// A cached sidecar is trusted only when the canonical text hash agrees,
    /// the stored duration matches the audio file within tolerance and the
    /// reconstruction contract has not changed since it was written.
    pub fn is_valid_for(&self, text_hash: &str, audio_duration_ms: u64, tolerance_ms: u64) -> bool {
        if self.alignment_version != ALIGNMENT_VERSION {
            debug!(
                stored = self.alignment_version,
                current = ALIGNMENT_VERSION,
                "sidecar version mismatch"
            );
            return false;
        }
        if self.text_hash != text_hash {
            debug!("sidecar text hash mismatch");
            return false;
        }
        let drift = self.duration_ms.abs_diff(audio_duration_ms);
        if drift > tolerance_ms {
            debug!(drift, tolerance_ms, "sidecar duration drift too large");
            return false;
        }
        true
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Serialize fully, then replace the file in one rename. A reader sees
    /// either the old complete sidecar or the new one, never a partial write.
    pub fn save_atomic(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &bytes)
    }
}

/// `reading_time_s` and `words_per_minute` from the final word list.
pub fn derive_reading_stats(word_count: usize, duration_ms: u64) -> (f64, f64) {
    let reading_time_s = duration_ms as f64 / 1000.0;
    let words_per_minute = if reading_time_s > 0.0 {
        60.0 * word_count as f64 / reading_time_s
    } else {
        0.0
    };
    (reading_time_s, words_per_minute)
}

/// Min start / max end over the tokens each marker covers. Markers whose
/// tokens cannot be found in this render are omitted rather than guessed.
pub fn placeholder_timings(
    words: &[Word],
    blocks: &[Block],
    anchors: &[AnchorInterval],
) -> Vec<PlaceholderTiming> {
    let mut timings = Vec::new();

    for block in blocks {
        if let Some((start_ms, end_ms)) = range_timing(words, block.tok_start, block.tok_end) {
            timings.push(PlaceholderTiming {
                id: block.id.clone(),
                kind: "block".to_string(),
                start_ms,
                end_ms,
            });
        }
    }
    for anchor in anchors {
        if let Some((start_ms, end_ms)) = range_timing(words, anchor.tok_start, anchor.tok_end) {
            timings.push(PlaceholderTiming {
                id: anchor.text.clone(),
                kind: "anchor".to_string(),
                start_ms,
                end_ms,
            });
        }
    }

    timings
}

fn range_timing(words: &[Word], tok_start: usize, tok_end: usize) -> Option<(u64, u64)> {
    let covered: Vec<&Word> = words
        .iter()
        .filter(|w| w.index >= tok_start && w.index <= tok_end)
        .collect();
    if covered.is_empty() {
        return None;
    }
    let start_ms = covered.iter().map(|w| w.start_ms).min()?;
    let end_ms = covered.iter().map(|w| w.end_ms).max()?;
    Some((start_ms, end_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::BlockKind;

    fn sample_sidecar() -> SidecarMetadata {
        SidecarMetadata {
            section_id: "sec-1".to_string(),
            voice: "alloy".to_string(),
            tts_model: "gpt-4o-mini-tts".to_string(),
            transcription_model: None,
            text_hash: "abc123def456".to_string(),
            tts_text: "Hello world.".to_string(),
            duration_ms: 1000,
            reading_time_s: 1.0,
            words_per_minute: 120.0,
            words: vec![
                Word::new(0, "Hello", 0, 500),
                Word::new(1, "world.", 500, 1000),
            ],
            placeholders_timing: Vec::new(),
            alignment_version: ALIGNMENT_VERSION,
            tts_html: String::new(),
            tts_html_body: String::new(),
            tts_css: String::new(),
            tts_html_stats: HtmlStats::default(),
        }
    }

    #[test]
    fn validity_requires_hash_duration_and_version() {
        let sidecar = sample_sidecar();
        assert!(sidecar.is_valid_for("abc123def456", 1000, 200));
        assert!(sidecar.is_valid_for("abc123def456", 1150, 200));
        assert!(!sidecar.is_valid_for("other", 1000, 200));
        assert!(!sidecar.is_valid_for("abc123def456", 1500, 200));

        let mut stale = sample_sidecar();
        stale.alignment_version = ALIGNMENT_VERSION - 1;
        assert!(!stale.is_valid_for("abc123def456", 1000, 200));
    }

    #[test]
    fn reading_stats_derive_from_duration_and_count() {
        let (reading_time_s, wpm) = derive_reading_stats(120, 60_000);
        assert!((reading_time_s - 60.0).abs() < 1e-9);
        assert!((wpm - 120.0).abs() < 1e-9);

        let (_, wpm_zero) = derive_reading_stats(10, 0);
        assert_eq!(wpm_zero, 0.0);
    }

    #[test]
    fn placeholder_timing_spans_min_to_max() {
        let words = vec![
            Word::new(0, "a", 0, 100),
            Word::new(1, "b", 100, 250),
            Word::new(2, "c", 250, 400),
        ];
        let blocks = vec![Block {
            kind: BlockKind::Paragraph,
            level: 0,
            id: "p1".to_string(),
            tok_start: 0,
            tok_end: 1,
        }];
        let anchors = vec![AnchorInterval {
            tok_start: 2,
            tok_end: 2,
            html: "<a>c</a>".to_string(),
            text: "c".to_string(),
        }];
        let timings = placeholder_timings(&words, &blocks, &anchors);
        assert_eq!(timings.len(), 2);
        assert_eq!((timings[0].start_ms, timings[0].end_ms), (0, 250));
        assert_eq!(timings[1].kind, "anchor");
        assert_eq!((timings[1].start_ms, timings[1].end_ms), (250, 400));
    }

    #[test]
    fn markers_without_tokens_are_omitted() {
        let words = vec![Word::new(0, "a", 0, 100)];
        let blocks = vec![Block {
            kind: BlockKind::Paragraph,
            level: 0,
            id: "ghost".to_string(),
            tok_start: 5,
            tok_end: 9,
        }];
        assert!(placeholder_timings(&words, &blocks, &[]).is_empty());
    }

    #[test]
    fn sidecar_round_trips_through_json() {
        let sidecar = sample_sidecar();
        let json = serde_json::to_string(&sidecar).expect("serialize");
        let back: SidecarMetadata = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.text_hash, sidecar.text_hash);
        assert_eq!(back.words, sidecar.words);
        assert_eq!(back.alignment_version, ALIGNMENT_VERSION);
    }

    #[test]
    fn save_is_whole_file_replacement() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sidecar.json");

        let mut sidecar = sample_sidecar();
        sidecar.save_atomic(&path).expect("first save");
        sidecar.duration_ms = 2000;
        sidecar.save_atomic(&path).expect("second save");

        let loaded = SidecarMetadata::load(&path).expect("load");
        assert_eq!(loaded.duration_ms, 2000);
    }
}
