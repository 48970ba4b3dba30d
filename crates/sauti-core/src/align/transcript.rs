//! Transcription-based aligner.
//!
//! Runs a full-audio transcription with word timestamps and returns the
//! transcriber's own word list. Independent transcription cannot guarantee
//! textual fidelity, so this backend is a fallback: the reconciler checks
//! its token overlap against canonical text and, when accepted, discards the
//! transcription's spelling by re-labelling every slot with the canonical
//! word at that position.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::align::AlignmentBackend;
use crate::audio::wav::{encode_wav_bytes, PcmAudio};
use crate::config::TranscriptionConfig;
use crate::error::Result;
use crate::text::canonical::CanonicalText;
use crate::types::{AlignmentResult, Word};

pub struct TranscriptAligner {
    config: TranscriptionConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    words: Vec<TranscribedWord>,
}

#[derive(Debug, Deserialize)]
struct TranscribedWord {
    word: String,
    /// Seconds from audio start.
    start: f64,
    end: f64,
}

impl TranscriptAligner {
    pub fn new(config: TranscriptionConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlignmentBackend for TranscriptAligner {
    fn name(&self) -> &'static str {
        "transcript"
    }

    async fn align(
        &self,
        audio: &PcmAudio,
        _text: &CanonicalText,
        language: Option<&str>,
    ) -> Result<Option<AlignmentResult>> {
        if self.config.api_key.is_none() {
            debug!("transcription aligner has no API key configured");
            return Ok(None);
        }

        let wav_bytes = encode_wav_bytes(audio)?;
        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav_bytes)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| crate::error::Error::InvalidInput(e.to_string()))?,
            )
            .text("model", self.config.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word");
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        let mut request = self.client.post(&self.config.endpoint).multipart(form);
        if let Some(key) = self.config.api_key.as_deref() {
            request = request.bearer_auth(key);
        }

        let response = match request
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!("transcription service unreachable: {err}");
                return Ok(None);
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "transcription service rejected request");
            return Ok(None);
        }

        let parsed: TranscriptionResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("transcription payload unparseable: {err}");
                return Ok(None);
            }
        };
        if parsed.words.is_empty() {
            debug!("transcription returned no words");
            return Ok(None);
        }

        let duration_ms = audio.duration_ms();
        let words = parsed
            .words
            .into_iter()
            .enumerate()
            .map(|(index, w)| {
                let start_ms = seconds_to_ms(w.start);
                let end_ms = seconds_to_ms(w.end).max(start_ms);
                Word::new(index, w.word.trim(), start_ms, end_ms)
            })
            .collect();

        Ok(Some(AlignmentResult {
            words,
            duration_ms,
            source: self.name(),
        }))
    }
}

fn seconds_to_ms(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds < 0.0 {
        return 0;
    }
    (seconds * 1000.0).round() as u64
}
