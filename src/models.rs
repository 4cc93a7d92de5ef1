//! Core data models for the resonance graph.
//!
//! These types represent the nodes, edges, and search results that flow
//! through the ingestion and retrieval pipeline. The data lifecycle is:
//!
//! ```text
//! Markdown file → normalize() → BentoBoxer → box (locus id via ledger)
//!                                              ↓
//!                                         embed() + tokenize() → Node
//!                                              ↓
//!                                         weave() → Edge
//!                                              ↓
//!                                         search() → SearchHit
//! ```
//!
//! # Type Relationships
//!
//! - A **[`Node`]** is the unit of content in the graph: a lexicon concept,
//!   a directive, or a locus of narrative Markdown.
//! - An **[`Edge`]** is a directed relation between two node ids. The
//!   relation label is an uppercase string (`TAGGED_AS`, `CITES`, …) and is
//!   deliberately open-ended: the metadata-block syntax can mint custom
//!   labels.
//! - A **[`SearchHit`]** is returned by the hybrid engine with a fused
//!   score and the path ([`SearchSource`]) that produced it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Enumerated node kind.
///
/// Lexicon entries are `Concept`, directive-catalog entries are `Directive`,
/// and experience content carries the kind of its source collection
/// (`Playbook`, `Debrief`, `Note`, …). `Root` and `Domain` are structural
/// anchors excluded from orphan rescue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Concept,
    Directive,
    Document,
    Playbook,
    Debrief,
    Note,
    Section,
    Root,
    Domain,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Concept => "concept",
            NodeKind::Directive => "directive",
            NodeKind::Document => "document",
            NodeKind::Playbook => "playbook",
            NodeKind::Debrief => "debrief",
            NodeKind::Note => "note",
            NodeKind::Section => "section",
            NodeKind::Root => "root",
            NodeKind::Domain => "domain",
        }
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "concept" => Ok(NodeKind::Concept),
            "directive" => Ok(NodeKind::Directive),
            "document" => Ok(NodeKind::Document),
            "playbook" => Ok(NodeKind::Playbook),
            "debrief" => Ok(NodeKind::Debrief),
            "note" => Ok(NodeKind::Note),
            "section" => Ok(NodeKind::Section),
            "root" => Ok(NodeKind::Root),
            "domain" => Ok(NodeKind::Domain),
            other => Err(format!("unknown node kind: '{}'", other)),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level partition of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphDomain {
    Persona,
    Experience,
    Knowledge,
    Lexicon,
}

impl GraphDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphDomain::Persona => "persona",
            GraphDomain::Experience => "experience",
            GraphDomain::Knowledge => "knowledge",
            GraphDomain::Lexicon => "lexicon",
        }
    }
}

impl FromStr for GraphDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "persona" => Ok(GraphDomain::Persona),
            "experience" => Ok(GraphDomain::Experience),
            "knowledge" => Ok(GraphDomain::Knowledge),
            "lexicon" => Ok(GraphDomain::Lexicon),
            other => Err(format!("unknown domain: '{}'", other)),
        }
    }
}

/// Vertical layer within a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphLayer {
    Ontology,
    Directive,
    Note,
    Experience,
}

impl GraphLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphLayer::Ontology => "ontology",
            GraphLayer::Directive => "directive",
            GraphLayer::Note => "note",
            GraphLayer::Experience => "experience",
        }
    }
}

impl FromStr for GraphLayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ontology" => Ok(GraphLayer::Ontology),
            "directive" => Ok(GraphLayer::Directive),
            "note" => Ok(GraphLayer::Note),
            "experience" => Ok(GraphLayer::Experience),
            other => Err(format!("unknown layer: '{}'", other)),
        }
    }
}

/// The unit of content in the graph, stored in the `nodes` table.
///
/// | Field | Description |
/// |-------|-------------|
/// | `id` | UUIDv4 for ledger-minted loci, human-readable slug for lexicon/directive entries |
/// | `kind` | [`NodeKind`] |
/// | `title` / `content` | Optional display title and Markdown body |
/// | `domain` / `layer` | Graph partition coordinates |
/// | `embedding` | Unit-norm `f32` vector as little-endian bytes; `None` when the locus is too short or structural |
/// | `hash` | MD5-hex of the trimmed content; drives idempotent re-ingest |
/// | `meta` | Opaque JSON bag: source path, semantic tokens, aliases, box id, date, … |
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub title: Option<String>,
    pub content: Option<String>,
    pub domain: GraphDomain,
    pub layer: GraphLayer,
    pub embedding: Option<Vec<u8>>,
    pub hash: Option<String>,
    pub meta: serde_json::Value,
}

/// A directed relation between two node ids.
///
/// `(source, target, kind)` is the composite primary key. The target is not
/// required to exist at insert time; the validator flags dangling targets
/// after ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: String,
}

impl Edge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: kind.into(),
        }
    }
}

/// One row of the lexicon artifact (`lexicon.json`).
///
/// Unknown fields are tolerated; a malformed entry is skipped with a warning
/// rather than aborting Phase 1.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LexiconEntry {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One row of the enriched directive catalog (`cda.json`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectiveEntry {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub relationships: Vec<DirectiveRelationship>,
}

/// A validated relationship carried by a directive entry.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectiveRelationship {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
}

/// Lexicon-aligned entities and concepts extracted from one box of text.
///
/// Only the lexicon-driven fields (`protocols`, `organizations`, `concepts`)
/// are populated by the tokenizer itself; the generic NER fields exist for
/// an optional auxiliary stage and serialize empty otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticTokens {
    #[serde(default)]
    pub people: Vec<String>,
    #[serde(default)]
    pub places: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub money: Vec<String>,
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default)]
    pub concepts: Vec<String>,
}

impl SemanticTokens {
    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
            && self.places.is_empty()
            && self.organizations.is_empty()
            && self.topics.is_empty()
            && self.money.is_empty()
            && self.protocols.is_empty()
            && self.concepts.is_empty()
    }
}

/// A keyword (BM25) hit from the FTS index.
#[derive(Debug, Clone)]
pub struct TextHit {
    pub id: String,
    pub title: Option<String>,
    pub snippet: String,
    /// Raw FTS5 rank; lower is better.
    pub bm25_rank: f64,
}

/// A brute-force vector similarity hit.
#[derive(Debug, Clone)]
pub struct SimilarHit {
    pub id: String,
    pub title: Option<String>,
    pub content: Option<String>,
    /// Dot product against the query vector; equals cosine for unit vectors.
    pub score: f32,
}

/// Which retrieval path produced a [`SearchHit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    Vector,
    Keyword,
    Hybrid,
}

/// A fused result from the hybrid engine.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub source: SearchSource,
    pub preview: String,
}

/// Aggregate store counters reported by `polyvis stats` and consumed by the
/// validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: i64,
    pub edges: i64,
    pub vectors: i64,
    pub fts_rows: i64,
    pub db_bytes: i64,
}

/// Parsed YAML-style frontmatter: one `key: value` pair per line.
pub type Frontmatter = BTreeMap<String, String>;
