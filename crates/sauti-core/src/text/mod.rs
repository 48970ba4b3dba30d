//! Canonical text normalization and tokenization.

pub mod canonical;
pub mod tokens;

pub use canonical::{canonicalize, CanonicalText};
pub use tokens::{normalize_token, token_offsets, TokenOffset};
