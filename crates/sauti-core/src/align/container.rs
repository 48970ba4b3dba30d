//! Containerized external forced aligner.
//!
//! Invoked as a subprocess that receives a WAV path and a transcript path
//! and prints a time-tier structure as JSON. The tier layout varies between
//! aligner builds, so the parser accepts both entry shapes observed in the
//! wild: objects (`{start, end, label}` or `{xmin, xmax, text}`) and bare
//! `[start, end, label]` triplets. Silence and placeholder labels are
//! discarded. Anything unparseable is a decline, not an error.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::align::AlignmentBackend;
use crate::audio::wav::{encode_wav_bytes, PcmAudio};
use crate::config::ContainerAlignerConfig;
use crate::error::Result;
use crate::text::canonical::CanonicalText;
use crate::types::{AlignmentResult, Word};

pub struct ContainerAligner {
    config: ContainerAlignerConfig,
}

impl ContainerAligner {
    pub fn new(config: ContainerAlignerConfig) -> Self {
        Self { config }
    }

    fn scratch_paths() -> (PathBuf, PathBuf) {
        let run_id = Uuid::new_v4().simple().to_string();
        let dir = std::env::temp_dir();
        (
            dir.join(format!("sauti-align-{run_id}.wav")),
            dir.join(format!("sauti-align-{run_id}.txt")),
        )
    }
}

#[async_trait]
impl AlignmentBackend for ContainerAligner {
    fn name(&self) -> &'static str {
        "container"
    }

    async fn align(
        &self,
        audio: &PcmAudio,
        text: &CanonicalText,
        _language: Option<&str>,
    ) -> Result<Option<AlignmentResult>> {
        let Some(command) = self.config.command.as_deref() else {
            debug!("container aligner not configured");
            return Ok(None);
        };

        let (wav_path, txt_path) = Self::scratch_paths();
        tokio::fs::write(&wav_path, encode_wav_bytes(audio)?).await?;
        tokio::fs::write(&txt_path, text.text()).await?;

        let output = tokio::process::Command::new(command)
            .args(&self.config.args)
            .arg(&wav_path)
            .arg(&txt_path)
            .output()
            .await;

        let _ = tokio::fs::remove_file(&wav_path).await;
        let _ = tokio::fs::remove_file(&txt_path).await;

        let output = match output {
            Ok(output) => output,
            Err(err) => {
                warn!("container aligner failed to start: {err}");
                return Ok(None);
            }
        };
        if !output.status.success() {
            warn!(status = ?output.status.code(), "container aligner exited with failure");
            return Ok(None);
        }

        let value: Value = match serde_json::from_slice(&output.stdout) {
            Ok(value) => value,
            Err(err) => {
                warn!("container aligner produced non-JSON output: {err}");
                return Ok(None);
            }
        };

        let duration_ms = audio.duration_ms();
        match parse_time_tiers(&value) {
            Some(words) if !words.is_empty() => Ok(Some(AlignmentResult {
                words,
                duration_ms,
                source: self.name(),
            })),
            _ => {
                debug!("no word tier recognized in aligner output");
                Ok(None)
            }
        }
    }
}

/// Flatten the best word tier of a time-tier document into a Word list.
pub fn parse_time_tiers(value: &Value) -> Option<Vec<Word>> {
    let tiers = match value {
        Value::Object(map) => map.get("tiers")?.as_array()?.clone(),
        // A bare array is treated as a single anonymous tier.
        Value::Array(_) => vec![serde_json::json!({ "entries": value })],
        _ => return None,
    };

    let mut best: Option<(bool, Vec<Word>)> = None;
    for tier in &tiers {
        let name = tier
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_ascii_lowercase();
        let entries = ["entries", "items", "intervals"]
            .iter()
            .find_map(|key| tier.get(*key))
            .and_then(Value::as_array);
        let Some(entries) = entries else {
            continue;
        };

        let mut words = Vec::new();
        for entry in entries {
            if let Some((label, start_ms, end_ms)) = parse_entry(entry) {
                if is_silence_label(&label) {
                    continue;
                }
                let index = words.len();
                words.push(Word::new(index, label, start_ms, end_ms.max(start_ms)));
            }
        }
        if words.is_empty() {
            continue;
        }

        let is_word_tier = name.contains("word");
        match &best {
            Some((best_is_word, best_words))
                if *best_is_word || (!is_word_tier && best_words.len() >= words.len()) => {}
            _ => best = Some((is_word_tier, words)),
        }
    }

    best.map(|(_, words)| words)
}

/// One tier entry in either supported shape.
fn parse_entry(entry: &Value) -> Option<(String, u64, u64)> {
    match entry {
        Value::Object(map) => {
            let label = map
                .get("label")
                .or_else(|| map.get("text"))
                .and_then(Value::as_str)?
                .trim()
                .to_string();
            let start = map.get("start").or_else(|| map.get("xmin"))?;
            let end = map.get("end").or_else(|| map.get("xmax"))?;
            Some((label, seconds_to_ms(start)?, seconds_to_ms(end)?))
        }
        Value::Array(items) if items.len() == 3 => {
            let label = items[2].as_str()?.trim().to_string();
            Some((label, seconds_to_ms(&items[0])?, seconds_to_ms(&items[1])?))
        }
        _ => None,
    }
}

fn seconds_to_ms(value: &Value) -> Option<u64> {
    let seconds = value.as_f64()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some((seconds * 1000.0).round() as u64)
}

/// Silence/unknown-phone markers and bracketed placeholder tokens carry no
/// word content.
fn is_silence_label(label: &str) -> bool {
    if label.is_empty() {
        return true;
    }
    if matches!(label, "sil" | "sp" | "spn" | "<unk>" | "<eps>" | "<sil>") {
        return true;
    }
    let bracketed = |open, close| label.starts_with(open) && label.ends_with(close);
    bracketed('[', ']') || bracketed('{', '}') || bracketed('<', '>')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_object_entries() {
        let doc = serde_json::json!({
            "tiers": [{
                "name": "words",
                "entries": [
                    { "start": 0.0, "end": 0.5, "label": "hello" },
                    { "start": 0.5, "end": 0.6, "label": "sil" },
                    { "start": 0.6, "end": 1.1, "label": "world" }
                ]
            }]
        });
        let words = parse_time_tiers(&doc).expect("words");
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].word, "hello");
        assert_eq!(words[1].start_ms, 600);
        assert_eq!(words[1].index, 1);
    }

    #[test]
    fn parses_praat_style_entries() {
        let doc = serde_json::json!({
            "tiers": [{
                "name": "words",
                "intervals": [
                    { "xmin": 0.0, "xmax": 0.25, "text": "one" },
                    { "xmin": 0.25, "xmax": 0.75, "text": "two" }
                ]
            }]
        });
        let words = parse_time_tiers(&doc).expect("words");
        assert_eq!(words[1].end_ms, 750);
    }

    #[test]
    fn parses_triplet_entries() {
        let doc = serde_json::json!({
            "tiers": [{
                "name": "words",
                "entries": [[0.0, 0.4, "alpha"], [0.4, 0.9, "beta"], [0.9, 1.0, "<unk>"]]
            }]
        });
        let words = parse_time_tiers(&doc).expect("words");
        assert_eq!(words.len(), 2);
        assert_eq!(words[1].word, "beta");
    }

    #[test]
    fn prefers_word_tier_over_larger_phone_tier() {
        let doc = serde_json::json!({
            "tiers": [
                {
                    "name": "phones",
                    "entries": [[0.0, 0.1, "h"], [0.1, 0.2, "e"], [0.2, 0.3, "l"], [0.3, 0.5, "o"]]
                },
                {
                    "name": "words",
                    "entries": [[0.0, 0.5, "hello"]]
                }
            ]
        });
        let words = parse_time_tiers(&doc).expect("words");
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "hello");
    }

    #[test]
    fn bracketed_placeholders_are_discarded() {
        let doc = serde_json::json!({
            "tiers": [{
                "name": "words",
                "entries": [[0.0, 0.4, "{OOV}"], [0.4, 0.9, "[noise]"], [0.9, 1.4, "kept"]]
            }]
        });
        let words = parse_time_tiers(&doc).expect("words");
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].word, "kept");
    }

    #[test]
    fn unknown_shapes_decline() {
        assert!(parse_time_tiers(&serde_json::json!({ "tiers": [{ "name": "words" }] })).is_none());
        assert!(parse_time_tiers(&serde_json::json!("nonsense")).is_none());
    }
}
