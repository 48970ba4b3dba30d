//! Whitespace tokenization with byte offsets into the source text.

/// Half-open byte range of one whitespace-delimited token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenOffset {
    pub start: usize,
    pub end: usize,
}

impl TokenOffset {
    /// True when this token's range intersects `[start, end)`.
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start < end && start < self.end
    }
}

/// Byte offsets of every whitespace-delimited token, in text order.
pub fn token_offsets(text: &str) -> Vec<TokenOffset> {
    let mut offsets = Vec::new();
    let mut start = None;

    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                offsets.push(TokenOffset { start: s, end: idx });
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(s) = start {
        offsets.push(TokenOffset {
            start: s,
            end: text.len(),
        });
    }

    offsets
}

/// Lowercased alphanumeric core of a token, for overlap comparisons between
/// alignment output and canonical text. Punctuation-only tokens normalize to
/// an empty string and are excluded from those comparisons.
pub fn normalize_token(token: &str) -> String {
    token
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(|ch| ch.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_cover_each_token_exactly() {
        let text = "Hello world. Goodbye.";
        let offsets = token_offsets(text);
        assert_eq!(offsets.len(), 3);
        assert_eq!(&text[offsets[0].start..offsets[0].end], "Hello");
        assert_eq!(&text[offsets[1].start..offsets[1].end], "world.");
        assert_eq!(&text[offsets[2].start..offsets[2].end], "Goodbye.");
    }

    #[test]
    fn trailing_token_without_whitespace_is_captured() {
        let offsets = token_offsets("one two");
        assert_eq!(offsets.last().map(|o| (o.start, o.end)), Some((4, 7)));
    }

    #[test]
    fn empty_and_blank_texts_have_no_tokens() {
        assert!(token_offsets("").is_empty());
        assert!(token_offsets("   \t ").is_empty());
    }

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize_token("World."), "world");
        assert_eq!(normalize_token("(Smith,"), "smith");
        assert_eq!(normalize_token("—"), "");
    }

    #[test]
    fn overlap_is_half_open() {
        let tok = TokenOffset { start: 5, end: 10 };
        assert!(tok.overlaps(0, 6));
        assert!(tok.overlaps(9, 20));
        assert!(!tok.overlaps(10, 20));
        assert!(!tok.overlaps(0, 5));
    }
}
