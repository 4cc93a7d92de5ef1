//! The bento boxer: Markdown → size-bounded locus units.
//!
//! Splits a Markdown body into a sequence of *bento boxes*, each small
//! enough to embed meaningfully (≤ `max_tokens` whitespace tokens) and
//! aligned to semantic boundaries. Parsing uses pulldown-cmark with source
//! offsets, so every box is an exact byte slice of the input and
//! concatenating all boxes reproduces the original modulo inter-block
//! whitespace — the property the `audit` command verifies.
//!
//! # Algorithm
//!
//! 1. Walk top-level blocks; open a new group at every heading of depth ≤ 4,
//!    accumulate other blocks into the current group.
//! 2. A group within the token budget is emitted as one box.
//! 3. An oversized group **fractures**: split at a thematic break when one
//!    exists, otherwise halve the block list recursively. A single oversized
//!    block (a long code fence, say) is emitted as-is.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Heading,
    Rule,
    Other,
}

#[derive(Debug, Clone)]
struct Block {
    range: Range<usize>,
    kind: BlockKind,
}

/// Segment a Markdown body (frontmatter already removed) into box contents.
pub fn segment(body: &str, max_tokens: usize) -> Vec<String> {
    let blocks = top_level_blocks(body);
    if blocks.is_empty() {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        return vec![trimmed.to_string()];
    }

    let mut groups: Vec<Vec<Block>> = Vec::new();
    for block in blocks {
        let opens_group = block.kind == BlockKind::Heading;
        match groups.last_mut() {
            Some(group) if !opens_group => group.push(block),
            _ => groups.push(vec![block]),
        }
    }

    let mut boxes = Vec::new();
    for group in &groups {
        fracture(body, group, max_tokens, &mut boxes);
    }
    boxes
}

/// Whitespace-token count used for the box budget.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn top_level_blocks(body: &str) -> Vec<Block> {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let mut blocks = Vec::new();
    let mut depth = 0usize;

    for (event, range) in Parser::new_ext(body, options).into_offset_iter() {
        match event {
            Event::Start(tag) => {
                if depth == 0 {
                    let kind = match &tag {
                        Tag::Heading { level, .. } if group_heading(*level) => BlockKind::Heading,
                        _ => BlockKind::Other,
                    };
                    blocks.push(Block { range, kind });
                }
                depth += 1;
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Rule if depth == 0 => blocks.push(Block {
                range,
                kind: BlockKind::Rule,
            }),
            _ => {}
        }
    }
    blocks
}

fn group_heading(level: HeadingLevel) -> bool {
    matches!(
        level,
        HeadingLevel::H1 | HeadingLevel::H2 | HeadingLevel::H3 | HeadingLevel::H4
    )
}

fn fracture(src: &str, blocks: &[Block], max_tokens: usize, out: &mut Vec<String>) {
    if blocks.is_empty() {
        return;
    }

    let start = blocks[0].range.start;
    let end = blocks[blocks.len() - 1].range.end;
    let slice = &src[start..end];

    if token_count(slice) <= max_tokens || blocks.len() == 1 {
        let trimmed = slice.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }
        return;
    }

    let split_at = rule_nearest_middle(blocks).unwrap_or(blocks.len() / 2).max(1);
    fracture(src, &blocks[..split_at], max_tokens, out);
    fracture(src, &blocks[split_at..], max_tokens, out);
}

/// Index of the thematic break closest to the middle of the block list.
/// Index 0 is excluded: a split there would make no progress.
fn rule_nearest_middle(blocks: &[Block]) -> Option<usize> {
    let middle = blocks.len() / 2;
    blocks
        .iter()
        .enumerate()
        .filter(|(i, b)| b.kind == BlockKind::Rule && *i > 0)
        .min_by_key(|(i, _)| i.abs_diff(middle))
        .map(|(i, _)| i)
}
