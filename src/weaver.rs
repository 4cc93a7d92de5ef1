//! Explicit edge extraction from box content.
//!
//! Strict mode: only explicit signals produce edges, no fuzzy inference.
//! Four signals are recognized:
//!
//! | Signal | Syntax | Edge |
//! |--------|--------|------|
//! | Inline tag | `[Tag: Concept-Name]` (case-insensitive) | `TAGGED_AS` → resolved concept |
//! | Legacy stub | `tag-<slug>` | `EXEMPLIFIES` → resolved concept (policy-gated) |
//! | Metadata block | `<!-- tags: [REL: target], … -->` | `REL_UPPER` → target verbatim |
//! | Wiki-link | `[[Target]]` / `[[Target\|Label]]` | `CITES` → resolved concept |
//!
//! Unresolved inline tags, stubs, and wiki-links are dropped silently — no
//! ghost edges. All emissions pass through the Louvain gate.

use anyhow::Result;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::louvain::LouvainGate;
use crate::models::{Edge, LexiconEntry};
use crate::store::GraphStore;

fn inline_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\[tag:\s*([^\]]+)\]").unwrap())
}

fn legacy_stub_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\btag-([a-z0-9][a-z0-9-]*)").unwrap())
}

fn meta_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--\s*tags:\s*(.*?)-->").unwrap())
}

fn meta_pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^:\]]+):\s*([^\]]+)\]").unwrap())
}

fn wikilink_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\]|]+)(?:\|[^\]]*)?\]\]").unwrap())
}

/// Lowercase, collapse non-alphanumeric runs to `-`, trim `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Resolves author-facing names (slugs, titles) to lexicon node ids.
pub struct LexiconIndex {
    ids: HashSet<String>,
    by_title_slug: HashMap<String, String>,
}

impl LexiconIndex {
    pub fn build(entries: &[LexiconEntry]) -> Self {
        let mut ids = HashSet::new();
        let mut by_title_slug = HashMap::new();
        for entry in entries {
            ids.insert(entry.id.clone());
            if let Some(title) = &entry.title {
                by_title_slug.insert(slugify(title), entry.id.clone());
            }
        }
        Self { ids, by_title_slug }
    }

    /// A slug resolves if it is a lexicon id, the slug of a title, or the
    /// suffix of a `term-<slug>` id (the pairing legacy `tag-<slug>` stubs
    /// were written against).
    pub fn resolve(&self, slug: &str) -> Option<&str> {
        if let Some(id) = self.ids.get(slug) {
            return Some(id.as_str());
        }
        if let Some(id) = self.by_title_slug.get(slug) {
            return Some(id.as_str());
        }
        self.ids.get(&format!("term-{}", slug)).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// `[Tag: …]` values, raw.
pub fn parse_inline_tags(content: &str) -> Vec<String> {
    inline_tag_re()
        .captures_iter(content)
        .map(|c| c[1].trim().to_string())
        .collect()
}

/// `tag-<slug>` stubs, slug part only.
pub fn parse_legacy_stubs(content: &str) -> Vec<String> {
    legacy_stub_re()
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .collect()
}

/// `[KEY: Value]` pairs from every `<!-- tags: … -->` block.
pub fn parse_metadata_pairs(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for block in meta_block_re().captures_iter(content) {
        for pair in meta_pair_re().captures_iter(&block[1]) {
            pairs.push((pair[1].trim().to_string(), pair[2].trim().to_string()));
        }
    }
    pairs
}

/// `[[Target]]` / `[[Target|Label]]` targets, raw.
pub fn parse_wikilinks(content: &str) -> Vec<String> {
    wikilink_re()
        .captures_iter(content)
        .map(|c| c[1].trim().to_string())
        .collect()
}

/// What a weave pass did for one node.
#[derive(Debug, Default)]
pub struct WeaveReport {
    pub added: usize,
    pub rejections: Vec<String>,
}

pub struct EdgeWeaver {
    index: LexiconIndex,
    legacy_exemplifies: bool,
}

impl EdgeWeaver {
    pub fn new(index: LexiconIndex, legacy_exemplifies: bool) -> Self {
        Self {
            index,
            legacy_exemplifies,
        }
    }

    /// Scan `content` and emit edges from `source_id`, each gated.
    pub async fn weave(
        &self,
        store: &GraphStore,
        gate: &LouvainGate,
        source_id: &str,
        content: &str,
    ) -> Result<WeaveReport> {
        let mut edges: Vec<Edge> = Vec::new();

        for value in parse_inline_tags(content) {
            if let Some(concept) = self.index.resolve(&slugify(&value)) {
                edges.push(Edge::new(source_id, concept, "TAGGED_AS"));
            }
        }

        if self.legacy_exemplifies {
            for slug in parse_legacy_stubs(content) {
                if let Some(concept) = self.index.resolve(&slug) {
                    edges.push(Edge::new(source_id, concept, "EXEMPLIFIES"));
                }
            }
        }

        for (key, value) in parse_metadata_pairs(content) {
            if key.eq_ignore_ascii_case("quality") || key.starts_with('#') {
                continue;
            }
            edges.push(Edge::new(source_id, value, key.to_uppercase()));
        }

        for target in parse_wikilinks(content) {
            if let Some(concept) = self.index.resolve(&slugify(&target)) {
                edges.push(Edge::new(source_id, concept, "CITES"));
            }
        }

        let mut report = WeaveReport::default();
        for edge in edges {
            let decision = gate.check(store, &edge.source, &edge.target).await?;
            if decision.allowed {
                if store.insert_edge(&edge).await? {
                    report.added += 1;
                }
            } else if let Some(reason) = decision.reason {
                report.rejections.push(reason);
            }
        }
        Ok(report)
    }
}
