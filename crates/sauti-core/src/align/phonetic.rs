//! Phonetic forced aligner operating directly on raw canonical tokens.
//!
//! The acoustic pass runs in a local alignment service; this backend owns
//! the target tokenization and the time-step capacity check. A CTC-style
//! target sequence interleaves blanks around every emitted character, so the
//! frame budget is the hard ceiling: when the sequence cannot fit into the
//! audio's frame count there is no valid alignment path and the backend
//! declines instead of calling out.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::align::AlignmentBackend;
use crate::audio::wav::{encode_wav_bytes, PcmAudio};
use crate::config::PhoneticAlignerConfig;
use crate::error::Result;
use crate::text::canonical::CanonicalText;
use crate::types::{AlignmentResult, Word};

pub struct PhoneticAligner {
    config: PhoneticAlignerConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AlignResponse {
    words: Vec<AlignedWord>,
}

#[derive(Debug, Deserialize)]
struct AlignedWord {
    word: String,
    start_ms: u64,
    end_ms: u64,
}

impl PhoneticAligner {
    pub fn new(config: PhoneticAlignerConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

/// Length of the CTC target sequence for `text`: a leading blank, then for
/// each emitted character the character plus a blank, with a separator and a
/// blank between words. Characters with no phonetic value are not emitted.
pub fn target_token_count(text: &str) -> usize {
    let mut count = 1;
    let mut first_word = true;
    for word in text.split_whitespace() {
        let emitted = word.chars().filter(|ch| ch.is_alphanumeric()).count();
        if emitted == 0 {
            continue;
        }
        if !first_word {
            count += 2;
        }
        count += emitted * 2;
        first_word = false;
    }
    count
}

/// Number of acoustic time steps available for this audio.
pub fn frame_capacity(duration_ms: u64, frame_shift_ms: u64) -> usize {
    if frame_shift_ms == 0 {
        return 0;
    }
    (duration_ms / frame_shift_ms) as usize
}

#[async_trait]
impl AlignmentBackend for PhoneticAligner {
    fn name(&self) -> &'static str {
        "phonetic"
    }

    async fn align(
        &self,
        audio: &PcmAudio,
        text: &CanonicalText,
        language: Option<&str>,
    ) -> Result<Option<AlignmentResult>> {
        let Some(endpoint) = self.config.endpoint.as_deref() else {
            debug!("phonetic aligner not configured");
            return Ok(None);
        };

        let duration_ms = audio.duration_ms();
        let targets = target_token_count(text.text());
        let capacity = frame_capacity(duration_ms, self.config.frame_shift_ms);
        if targets > capacity {
            // Expected for very long text or very short audio.
            debug!(targets, capacity, "target sequence exceeds frame budget");
            return Ok(None);
        }

        let wav_bytes = encode_wav_bytes(audio)?;
        let body = serde_json::json!({
            "audio_base64": base64::engine::general_purpose::STANDARD.encode(&wav_bytes),
            "text": text.text(),
            "language": language,
            "frame_shift_ms": self.config.frame_shift_ms,
        });

        let response = match self.client.post(endpoint).json(&body).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("phonetic aligner unreachable: {err}");
                return Ok(None);
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "phonetic aligner rejected request");
            return Ok(None);
        }

        let parsed: AlignResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("phonetic aligner returned unparseable payload: {err}");
                return Ok(None);
            }
        };
        if parsed.words.is_empty() {
            return Ok(None);
        }

        let words = parsed
            .words
            .into_iter()
            .enumerate()
            .map(|(index, w)| Word::new(index, w.word, w.start_ms, w.end_ms.max(w.start_ms)))
            .collect();

        Ok(Some(AlignmentResult {
            words,
            duration_ms,
            source: self.name(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_count_interleaves_blanks() {
        // "ab" -> blank, a, blank, b, blank = 5.
        assert_eq!(target_token_count("ab"), 5);
        // "a b" adds separator + blank between words.
        assert_eq!(target_token_count("a b"), 7);
    }

    #[test]
    fn punctuation_only_tokens_emit_nothing() {
        assert_eq!(target_token_count("a — b"), target_token_count("a b"));
    }

    #[test]
    fn capacity_is_duration_over_frame_shift() {
        assert_eq!(frame_capacity(1000, 20), 50);
        assert_eq!(frame_capacity(999, 20), 49);
        assert_eq!(frame_capacity(1000, 0), 0);
    }

    #[tokio::test]
    async fn unconfigured_backend_declines() {
        let aligner = PhoneticAligner::new(PhoneticAlignerConfig::default());
        let audio = PcmAudio {
            samples: vec![0.0; 16_000],
            sample_rate: 16_000,
            channels: 1,
        };
        let text = crate::text::canonical::canonicalize("hello world").expect("canonicalize");
        let result = aligner.align(&audio, &text, None).await.expect("align");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn over_budget_text_declines_without_calling_out() {
        let config = PhoneticAlignerConfig {
            endpoint: Some("http://localhost:1/align".to_string()),
            frame_shift_ms: 20,
        };
        let aligner = PhoneticAligner::new(config);
        // 100 ms of audio: 5 frames, far below any real target sequence.
        let audio = PcmAudio {
            samples: vec![0.0; 1_600],
            sample_rate: 16_000,
            channels: 1,
        };
        let text = crate::text::canonical::canonicalize("a long enough sentence to overflow")
            .expect("canonicalize");
        let result = aligner.align(&audio, &text, None).await.expect("align");
        assert!(result.is_none());
    }
}
