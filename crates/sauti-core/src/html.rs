//! Timed-HTML reconstruction.
//!
//! Walks token spans in order, opening and closing structural block tags at
//! the right token boundaries and emitting exactly one element per token:
//! either a per-word timing span or a single consumed-anchor span covering a
//! citation range. Words are the source of truth; block coverage is
//! best-effort cosmetic structure and never suppresses content.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::structure::{AnchorInterval, Block, BlockKind};
use crate::types::TokenSpan;

/// Stylesheet stored alongside the reconstructed markup so playback views
/// can highlight the active word without shipping their own rules.
pub const DEFAULT_CSS: &str = "\
.tts-word { border-radius: 2px; }\n\
.tts-word.tts-active { background: #ffe08a; }\n\
.tts-anchor { opacity: 0.85; }\n";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlStats {
    pub word_spans: usize,
    pub anchor_spans: usize,
    pub blocks: usize,
    pub body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct HtmlRender {
    pub body: String,
    pub stats: HtmlStats,
}

enum BlockState {
    NoOpenBlock,
    InBlock { tag: String, tok_end: usize },
}

/// Reconstruct the document body from token spans, blocks and anchors.
///
/// Missing block or anchor markers are silent skips; the token spans
/// themselves were produced by sequential placement and are trusted here.
pub fn render_body(
    text: &str,
    spans: &[TokenSpan],
    blocks: &[Block],
    anchors: &[AnchorInterval],
) -> HtmlRender {
    let block_starts: HashMap<usize, &Block> =
        blocks.iter().map(|b| (b.tok_start, b)).collect();
    let anchor_starts: HashMap<usize, &AnchorInterval> =
        anchors.iter().map(|a| (a.tok_start, a)).collect();

    let mut body = String::new();
    let mut stats = HtmlStats::default();
    let mut state = BlockState::NoOpenBlock;
    let mut in_list = false;
    let mut last_char_end: Option<usize> = None;
    let mut just_opened_tag = false;

    let mut pos = 0usize;
    while pos < spans.len() {
        let span = &spans[pos];

        // Close a block whose range ended before this token.
        if let BlockState::InBlock { tag, tok_end } = &state {
            if span.index > *tok_end {
                close_tag(&mut body, tag);
                state = BlockState::NoOpenBlock;
            }
        }

        if let Some(block) = block_starts.get(&span.index) {
            if let BlockState::InBlock { tag, .. } = &state {
                close_tag(&mut body, tag);
            }
            if in_list && block.kind != BlockKind::ListItem {
                body.push_str("</ul>");
                in_list = false;
            }
            if block.kind == BlockKind::ListItem && !in_list {
                body.push_str("<ul>");
                in_list = true;
            }
            let tag = block_tag(block);
            open_tag(&mut body, &tag, &block.id);
            state = BlockState::InBlock {
                tag,
                tok_end: block.tok_end,
            };
            stats.blocks += 1;
            just_opened_tag = true;
        }

        if let Some(anchor) = anchor_starts.get(&span.index) {
            // One consumed span for the whole range; interior tokens are
            // already represented by the anchor's own markup.
            let covered: Vec<&TokenSpan> = spans[pos..]
                .iter()
                .take_while(|s| s.index <= anchor.tok_end)
                .collect();
            let start_ms = covered.iter().map(|s| s.start_ms).min().unwrap_or(span.start_ms);
            let end_ms = covered.iter().map(|s| s.end_ms).max().unwrap_or(span.end_ms);

            emit_gap(&mut body, text, last_char_end, span.char_start, just_opened_tag);
            body.push_str(&format!(
                "<span class=\"tts-anchor\" data-tts-start-ms=\"{start_ms}\" data-tts-end-ms=\"{end_ms}\">{}</span>",
                anchor.html
            ));
            stats.anchor_spans += 1;
            just_opened_tag = false;

            last_char_end = covered.last().map(|s| s.char_end).or(last_char_end);
            pos += covered.len().max(1);
            continue;
        }

        emit_gap(&mut body, text, last_char_end, span.char_start, just_opened_tag);
        let word = escape_html(&text[span.char_start..span.char_end]);
        body.push_str(&format!(
            "<span class=\"tts-word\" data-tts-index=\"{}\" data-tts-start-ms=\"{}\" data-tts-end-ms=\"{}\">{}</span>",
            span.index, span.start_ms, span.end_ms, word
        ));
        stats.word_spans += 1;
        just_opened_tag = false;
        last_char_end = Some(span.char_end);
        pos += 1;
    }

    if let BlockState::InBlock { tag, .. } = &state {
        close_tag(&mut body, tag);
    }
    if in_list {
        body.push_str("</ul>");
    }

    stats.body_bytes = body.len();
    HtmlRender { body, stats }
}

/// Wrap a rendered body into a standalone document.
pub fn wrap_document(body: &str, css: &str, title: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>\n{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        css,
        body
    )
}

/// Re-create the single-space separation between tokens, but only when the
/// skipped gap really is whitespace. Inventing characters is worse than a
/// missing space.
fn emit_gap(
    body: &mut String,
    text: &str,
    last_char_end: Option<usize>,
    char_start: usize,
    just_opened_tag: bool,
) {
    if just_opened_tag {
        return;
    }
    let Some(prev_end) = last_char_end else {
        return;
    };
    if prev_end >= char_start {
        return;
    }
    let gap = &text[prev_end..char_start];
    if !gap.is_empty() && gap.chars().all(char::is_whitespace) {
        body.push(' ');
    }
}

fn block_tag(block: &Block) -> String {
    match block.kind {
        BlockKind::Heading => format!("h{}", block.level.clamp(1, 6)),
        BlockKind::Paragraph => "p".to_string(),
        BlockKind::ListItem => "li".to_string(),
    }
}

fn open_tag(body: &mut String, tag: &str, id: &str) {
    if id.is_empty() {
        body.push_str(&format!("<{tag}>"));
    } else {
        body.push_str(&format!("<{tag} id=\"{}\">", escape_html(id)));
    }
}

fn close_tag(body: &mut String, tag: &str) {
    body.push_str(&format!("</{tag}>"));
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
