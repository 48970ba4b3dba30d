//! Engine configuration types.
//!
//! An `EngineConfig` is passed explicitly to the pipeline entry point; there
//! is no global mutable state. Backend availability is data, not module-level
//! flags.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The alignment sources the engine knows how to drive, in no particular
/// order here; priority lives in `enabled_backends`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-process phonetic forced aligner working on raw canonical tokens.
    Phonetic,
    /// Containerized external forced aligner emitting a time-tier structure.
    Container,
    /// Full-audio transcription re-split along canonical word boundaries.
    Transcript,
    /// Character-proportional distribution of the known audio duration.
    Proportional,
}

/// Configuration for the engine core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cache root for audio assets and sidecars. `None` resolves to the
    /// platform data dir (or `SAUTI_CACHE_DIR`).
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Alignment backends to try, most precise first.
    #[serde(default = "default_enabled_backends")]
    pub enabled_backends: Vec<BackendKind>,

    /// Optional ISO language hint forwarded to phonetic aligners.
    #[serde(default)]
    pub language_hint: Option<String>,

    /// Approximate token budget above which input is split into chunks.
    #[serde(default = "default_max_chunk_tokens")]
    pub max_chunk_tokens: usize,

    /// Words per chunk when no structural markers are available.
    #[serde(default = "default_fallback_chunk_words")]
    pub fallback_chunk_words: usize,

    /// Minimum token-overlap ratio for accepting an external alignment.
    /// Tunable; 0.5 is a working default, not a precise contract.
    #[serde(default = "default_min_match_ratio")]
    pub min_match_ratio: f32,

    /// How far a cached sidecar's duration may drift from the audio file
    /// before the sidecar is considered stale.
    #[serde(default = "default_duration_tolerance_ms")]
    pub duration_tolerance_ms: u64,

    #[serde(default)]
    pub synthesis: SynthesisConfig,

    #[serde(default)]
    pub phonetic: PhoneticAlignerConfig,

    #[serde(default)]
    pub container: ContainerAlignerConfig,

    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

/// Speech-synthesis provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default = "default_synthesis_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default = "default_tts_model")]
    pub model: String,

    /// Optional free-form delivery instructions forwarded verbatim.
    #[serde(default)]
    pub instructions: Option<String>,

    /// Container format requested from the provider.
    #[serde(default = "default_response_format")]
    pub response_format: String,

    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

/// Settings for the in-process phonetic forced aligner service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneticAlignerConfig {
    /// Alignment service endpoint. `None` means the backend is unavailable.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Acoustic frame shift used for the time-step capacity check.
    #[serde(default = "default_frame_shift_ms")]
    pub frame_shift_ms: u64,
}

/// Settings for the containerized external forced aligner.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContainerAlignerConfig {
    /// Executable to invoke. `None` means the backend is unavailable.
    #[serde(default)]
    pub command: Option<String>,

    /// Arguments placed before the audio and transcript paths.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Settings for the transcription-based fallback aligner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_transcription_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_transcription_model")]
    pub model: String,

    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_enabled_backends() -> Vec<BackendKind> {
    vec![
        BackendKind::Phonetic,
        BackendKind::Container,
        BackendKind::Transcript,
        BackendKind::Proportional,
    ]
}

fn default_max_chunk_tokens() -> usize {
    350
}

fn default_fallback_chunk_words() -> usize {
    200
}

fn default_min_match_ratio() -> f32 {
    0.5
}

fn default_duration_tolerance_ms() -> u64 {
    200
}

fn default_synthesis_endpoint() -> String {
    "https://api.openai.com/v1/audio/speech".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_tts_model() -> String {
    "gpt-4o-mini-tts".to_string()
}

fn default_response_format() -> String {
    "mp3".to_string()
}

fn default_http_timeout_secs() -> u64 {
    300
}

fn default_frame_shift_ms() -> u64 {
    20
}

fn default_transcription_endpoint() -> String {
    "https://api.openai.com/v1/audio/transcriptions".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            enabled_backends: default_enabled_backends(),
            language_hint: None,
            max_chunk_tokens: default_max_chunk_tokens(),
            fallback_chunk_words: default_fallback_chunk_words(),
            min_match_ratio: default_min_match_ratio(),
            duration_tolerance_ms: default_duration_tolerance_ms(),
            synthesis: SynthesisConfig::default(),
            phonetic: PhoneticAlignerConfig::default(),
            container: ContainerAlignerConfig::default(),
            transcription: TranscriptionConfig::default(),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: default_synthesis_endpoint(),
            api_key: None,
            voice: default_voice(),
            model: default_tts_model(),
            instructions: None,
            response_format: default_response_format(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Default for PhoneticAlignerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            frame_shift_ms: default_frame_shift_ms(),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_transcription_endpoint(),
            api_key: None,
            model: default_transcription_model(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backend_chain_is_priority_ordered() {
        let config = EngineConfig::default();
        assert_eq!(
            config.enabled_backends,
            vec![
                BackendKind::Phonetic,
                BackendKind::Container,
                BackendKind::Transcript,
                BackendKind::Proportional,
            ]
        );
    }

    #[test]
    fn config_deserializes_from_partial_json() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"max_chunk_tokens": 100}"#).expect("partial config");
        assert_eq!(config.max_chunk_tokens, 100);
        assert_eq!(config.min_match_ratio, 0.5);
        assert_eq!(config.synthesis.voice, "alloy");
    }
}
