//! Engine error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Input text normalized to nothing.
    #[error("input text is empty after normalization")]
    EmptyInput,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The word list and the text have diverged. Fatal for the current
    /// reconstruction; indicates a stale cache or an upstream alignment bug.
    #[error("word {index} ({word:?}) not found in text at or after byte {cursor}")]
    TokenNotFound {
        word: String,
        index: usize,
        cursor: usize,
    },

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("chunk merge failed: {0}")]
    ChunkMerge(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}
