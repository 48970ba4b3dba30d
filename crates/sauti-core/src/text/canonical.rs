//! Canonical "spoken text" normalization and content addressing.

use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

/// Hex chars kept from the SHA1 digest. Short enough for file names, long
/// enough that collisions within one cache are not a practical concern.
const SHORT_HASH_LEN: usize = 12;

/// The single normalized string actually sent to speech synthesis, plus its
/// stable content hash. Never mutated after creation; a new hash is a new
/// cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalText {
    text: String,
    hash: String,
}

impl CanonicalText {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn token_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Normalize arbitrary input into canonical spoken text.
///
/// Runs of whitespace (including line breaks and paragraph separators)
/// collapse to single spaces; the result is trimmed. Empty-after-normalize
/// input is a terminal error.
pub fn canonicalize(raw: &str) -> Result<CanonicalText> {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return Err(Error::EmptyInput);
    }

    let hash = short_hash(&text);
    Ok(CanonicalText { text, hash })
}

fn short_hash(text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(text.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..SHORT_HASH_LEN].to_string()
}
