//! Document structure supplied by the caller: block layout and inline
//! citation/footnote anchors, located by character range or literal text in
//! the spoken text.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::text::tokens::{token_offsets, TokenOffset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Heading,
    Paragraph,
    ListItem,
}

/// A structural block as described by the caller: a half-open byte range in
/// the spoken text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSpec {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(default)]
    pub level: u8,
    pub id: String,
    pub char_start: usize,
    pub char_end: usize,
}

/// A citation/footnote fragment that must be emitted as one atomic unit.
/// Located by re-finding `text` in the (possibly chunk-local) spoken text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorSpec {
    pub text: String,
    pub html: String,
}

/// The full structure description for one render request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentStructure {
    #[serde(default)]
    pub blocks: Vec<BlockSpec>,
    #[serde(default)]
    pub anchors: Vec<AnchorSpec>,
}

/// A block resolved to an inclusive token-index range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub level: u8,
    pub id: String,
    pub tok_start: usize,
    pub tok_end: usize,
}

/// An anchor resolved to an inclusive token-index range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorInterval {
    pub tok_start: usize,
    pub tok_end: usize,
    pub html: String,
    pub text: String,
}

/// Map block character ranges onto token indices of `text`.
///
/// Blocks come back sorted by `tok_start` with overlapping ranges truncated
/// so block `i` ends below block `i + 1`'s start; the final block is clamped
/// to the last token. Blocks matching no token are dropped silently.
pub fn resolve_blocks(text: &str, specs: &[BlockSpec]) -> Vec<Block> {
    let offsets = token_offsets(text);
    if offsets.is_empty() {
        return Vec::new();
    }
    let last_token = offsets.len() - 1;

    let mut blocks: Vec<Block> = Vec::with_capacity(specs.len());
    for spec in specs {
        let Some(range) = token_range(&offsets, spec.char_start, spec.char_end) else {
            debug!(id = %spec.id, "block matches no token, skipping");
            continue;
        };
        blocks.push(Block {
            kind: spec.kind,
            level: spec.level,
            id: spec.id.clone(),
            tok_start: range.0,
            tok_end: range.1,
        });
    }

    blocks.sort_by_key(|b| b.tok_start);

    // Truncate overlaps and clamp the tail, then drop anything emptied out.
    let mut normalized: Vec<Block> = Vec::with_capacity(blocks.len());
    for (pos, mut block) in blocks.clone().into_iter().enumerate() {
        if let Some(next) = blocks.get(pos + 1) {
            if block.tok_end >= next.tok_start {
                if next.tok_start == 0 {
                    debug!(id = %block.id, "block fully shadowed, skipping");
                    continue;
                }
                block.tok_end = next.tok_start - 1;
            }
        }
        block.tok_end = block.tok_end.min(last_token);
        if block.tok_end < block.tok_start {
            debug!(id = %block.id, "block emptied by truncation, skipping");
            continue;
        }
        normalized.push(block);
    }

    normalized
}

/// Locate anchors by literal substring search in `text`, mapping each hit to
/// the tokens its character range touches. Anchors absent from this text are
/// dropped, not errors: with chunked input an anchor may live in a different
/// chunk. Each spec claims at most one occurrence, searched left to right.
pub fn resolve_anchors(text: &str, specs: &[AnchorSpec]) -> Vec<AnchorInterval> {
    let offsets = token_offsets(text);
    if offsets.is_empty() {
        return Vec::new();
    }

    let mut anchors = Vec::new();
    for spec in specs {
        let needle = spec.text.trim();
        if needle.is_empty() {
            continue;
        }
        let Some(pos) = text.find(needle) else {
            debug!(text = %spec.text, "anchor text absent, dropping");
            continue;
        };
        let Some(range) = token_range(&offsets, pos, pos + needle.len()) else {
            continue;
        };
        anchors.push(AnchorInterval {
            tok_start: range.0,
            tok_end: range.1,
            html: spec.html.clone(),
            text: spec.text.clone(),
        });
    }

    anchors.sort_by_key(|a| a.tok_start);
    anchors
}

/// Inclusive token-index range of the tokens intersecting `[start, end)`.
fn token_range(offsets: &[TokenOffset], start: usize, end: usize) -> Option<(usize, usize)> {
    if end <= start {
        return None;
    }
    let first = offsets.iter().position(|t| t.overlaps(start, end))?;
    let last = offsets.iter().rposition(|t| t.overlaps(start, end))?;
    Some((first, last))
}
