//! Two-phase ingestion pipeline.
//!
//! Phase 1 (persona) loads the lexicon and directive catalog into the
//! store and seeds the tokenizer; Phase 2 (experience) scans the source
//! directories and upserts one node per bento box, with MD5 change
//! detection against the stored hash. Finalization runs the timeline
//! weaver, then semantic orphan rescue (so fresh timeline edges count
//! toward connectedness), then validation against the captured baseline.
//!
//! # Per-file flow
//!
//! 1. Read, split YAML frontmatter.
//! 2. Segment by inline `<!-- locus:ID -->` markers. An unmarked file runs
//!    through the bento boxer: a single resulting box keeps the filename
//!    slug as its id, while a multi-box file gets ledger-minted locus ids
//!    and the markers are written back to the source so identity survives
//!    later edits.
//! 3. Per box: hash → skip when unchanged; embed when the content is long
//!    enough; extract lexicon tokens; upsert; weave explicit edges.
//!
//! Failures are contained at file granularity: an unreadable file is
//! reported and the scan moves on. Change detection makes interrupted runs
//! resumable.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use crate::boxer;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::frontmatter;
use crate::ledger::{content_hash, LocusLedger};
use crate::louvain::LouvainGate;
use crate::models::{
    Edge, GraphDomain, GraphLayer, LexiconEntry, Node, NodeKind,
};
use crate::semantic;
use crate::sources;
use crate::store::GraphStore;
use crate::timeline;
use crate::tokenizer::LexiconTokenizer;
use crate::validate;
use crate::vectors;
use crate::weaver::{slugify, EdgeWeaver, LexiconIndex};

fn locus_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^<!--\s*locus:([a-zA-Z0-9-]+)\s*-->[ \t]*\r?\n").unwrap())
}

/// What to ingest in Phase 2. Empty restricts nothing: all configured
/// experience sources are scanned.
#[derive(Debug, Default)]
pub struct IngestScope {
    pub file: Option<PathBuf>,
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct Counters {
    files: usize,
    failures: usize,
    boxes: usize,
    skipped: usize,
    added: usize,
    updated: usize,
    embedded: usize,
    edges: usize,
    rejections: usize,
}

/// Run the full pipeline. Returns the process exit code: 0 on success,
/// 2 when validation failed.
pub async fn run_ingest(config: &Config, scope: IngestScope) -> Result<i32> {
    let store = GraphStore::open(&config.paths.database.resonance).await?;
    let ledger = LocusLedger::open(&config.ledger_path()).await?;
    let baseline = validate::capture_baseline(&store).await?;

    // Phase 1: persona.
    let lexicon = phase_persona(config, &store).await?;

    let mut tokenizer = LexiconTokenizer::new();
    tokenizer.load(&lexicon);
    let weaver = EdgeWeaver::new(
        LexiconIndex::build(&lexicon),
        config.weaving.legacy_exemplifies,
    );
    let gate = LouvainGate::new(config.weaving.louvain_threshold);
    let embedder = Embedder::create(&config.embedding).await;
    println!("✅ embedder: {} provider, {} dims", embedder.name(), embedder.dims());

    // Phase 2: experience.
    let mut totals = Counters::default();
    for (dir, kind) in experience_dirs(config, &scope) {
        let files = match scope.file {
            Some(ref f) => vec![f.clone()],
            None => match sources::walk_markdown_files(&dir) {
                Ok(files) => files,
                Err(e) => {
                    println!("❌ {}", e);
                    continue;
                }
            },
        };

        for path in files {
            match ingest_file(
                config, &store, &ledger, &embedder, &tokenizer, &weaver, &gate, &path, &kind,
            )
            .await
            {
                Ok(counters) => {
                    totals.files += 1;
                    totals.boxes += counters.boxes;
                    totals.skipped += counters.skipped;
                    totals.added += counters.added;
                    totals.updated += counters.updated;
                    totals.embedded += counters.embedded;
                    totals.edges += counters.edges;
                    totals.rejections += counters.rejections;
                }
                Err(e) => {
                    totals.failures += 1;
                    println!("❌ {}: {:#}", path.display(), e);
                }
            }
        }

        if scope.file.is_some() {
            break;
        }
    }
    println!(
        "✅ experience: {} files ({} failed), {} boxes ({} unchanged), +{} nodes, ~{} updated, {} embedded, +{} edges ({} gated)",
        totals.files,
        totals.failures,
        totals.boxes,
        totals.skipped,
        totals.added,
        totals.updated,
        totals.embedded,
        totals.edges,
        totals.rejections
    );

    // Finalization.
    let chained = timeline::weave_timeline(&store).await?;
    println!("✅ timeline: {} SUCCEEDS edges", chained);

    let (rescued, rejections) =
        semantic::rescue_orphans(&store, &gate, config.weaving.semantic_threshold).await?;
    println!(
        "✅ semantic: {} orphans rescued ({} gated)",
        rescued,
        rejections.len()
    );

    store.checkpoint().await?;

    let report = validate::validate(&store, baseline, &config.validation).await?;
    for warning in &report.warnings {
        println!("⚠️  validation: {}", warning);
    }
    for error in &report.errors {
        println!("❌ validation: {}", error);
    }
    println!(
        "{} validation: {}",
        if report.passed { "✅" } else { "❌" },
        report.summary
    );

    if let Some(baseline_path) = &config.validation.baseline {
        match validate::load_stats_baseline(baseline_path) {
            Ok(expected) => {
                let stats = store.get_stats().await?;
                for violation in
                    validate::compare_to_baseline(&stats, &expected, config.validation.tolerance)
                {
                    println!("⚠️  baseline: {}", violation);
                }
            }
            Err(e) => println!("⚠️  baseline: {:#}", e),
        }
    }

    ledger.close().await;
    store.close().await;
    Ok(if report.passed { 0 } else { 2 })
}

/// Phase 1: lexicon concepts and directive entries into the persona domain.
/// A missing artifact degrades the run (no tokenizer vocabulary, no tag
/// resolution) but does not abort it.
async fn phase_persona(config: &Config, store: &GraphStore) -> Result<Vec<LexiconEntry>> {
    let gate = LouvainGate::new(config.weaving.louvain_threshold);

    let lexicon = match sources::load_lexicon(&config.paths.sources.persona.lexicon) {
        Ok(entries) => entries,
        Err(e) => {
            println!("❌ lexicon: {:#}", e);
            Vec::new()
        }
    };

    for entry in &lexicon {
        let content = entry.definition.clone();
        let hash = content.as_deref().map(content_hash);
        let node = Node {
            id: entry.id.clone(),
            kind: NodeKind::Concept,
            title: entry.title.clone(),
            content,
            domain: GraphDomain::Persona,
            layer: GraphLayer::Ontology,
            embedding: None,
            hash,
            meta: serde_json::json!({
                "category": entry.category,
                "tags": entry.tags,
                "aliases": entry.aliases,
                "kind": entry.kind,
            }),
        };
        store.insert_node(&node).await?;
    }
    println!("✅ lexicon: {} concepts", lexicon.len());

    let directives = match sources::load_directives(&config.paths.sources.persona.cda) {
        Ok(entries) => entries,
        Err(e) => {
            println!("❌ directives: {:#}", e);
            Vec::new()
        }
    };

    let mut directive_edges = 0usize;
    let mut gated = 0usize;
    for entry in &directives {
        let hash = entry.content.as_deref().map(content_hash);
        let node = Node {
            id: entry.id.clone(),
            kind: NodeKind::Directive,
            title: entry.title.clone(),
            content: entry.content.clone(),
            domain: GraphDomain::Persona,
            layer: GraphLayer::Directive,
            embedding: None,
            hash,
            meta: serde_json::json!({}),
        };
        store.insert_node(&node).await?;

        for rel in &entry.relationships {
            let decision = gate.check(store, &entry.id, &rel.target).await?;
            if decision.allowed {
                let edge = Edge::new(entry.id.clone(), rel.target.clone(), rel.kind.to_uppercase());
                if store.insert_edge(&edge).await? {
                    directive_edges += 1;
                }
            } else {
                gated += 1;
            }
        }
    }
    println!(
        "✅ directives: {} entries, +{} edges ({} gated)",
        directives.len(),
        directive_edges,
        gated
    );

    Ok(lexicon)
}

fn experience_dirs(config: &Config, scope: &IngestScope) -> Vec<(PathBuf, String)> {
    if let Some(file) = &scope.file {
        let kind = kind_for_path(config, file);
        return vec![(file.parent().unwrap_or(Path::new(".")).to_path_buf(), kind)];
    }
    if let Some(dir) = &scope.dir {
        let kind = kind_for_path(config, dir);
        return vec![(dir.clone(), kind)];
    }
    config
        .paths
        .sources
        .experience
        .iter()
        .map(|s| (s.path.clone(), s.kind.clone()))
        .collect()
}

/// Default node kind for a path: the kind of the configured source that
/// contains it, else `note`.
fn kind_for_path(config: &Config, path: &Path) -> String {
    config
        .paths
        .sources
        .experience
        .iter()
        .find(|s| path.starts_with(&s.path))
        .map(|s| s.kind.clone())
        .unwrap_or_else(|| "note".to_string())
}

#[allow(clippy::too_many_arguments)]
async fn ingest_file(
    config: &Config,
    store: &GraphStore,
    ledger: &LocusLedger,
    embedder: &Embedder,
    tokenizer: &LexiconTokenizer,
    weaver: &EdgeWeaver,
    gate: &LouvainGate,
    path: &Path,
    source_kind: &str,
) -> Result<Counters> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled");

    let (front, body) = frontmatter::split(&raw);
    let fm = front.map(frontmatter::parse).unwrap_or_default();

    let boxes = segment_file(config, ledger, path, front, body, stem).await?;

    let kind = fm
        .get("type")
        .and_then(|t| NodeKind::from_str(t).ok())
        .or_else(|| NodeKind::from_str(source_kind).ok())
        .unwrap_or(NodeKind::Note);

    let mut counters = Counters::default();

    for (box_id, content) in boxes {
        let content = content.trim();
        if content.is_empty() {
            continue;
        }
        counters.boxes += 1;

        let current_hash = content_hash(content);
        let previous = store.get_node_hash(&box_id).await?;
        if previous.as_deref() == Some(current_hash.as_str()) {
            counters.skipped += 1;
            continue;
        }

        let embedding = if embedder.is_enabled() && content.len() > config.embedding.min_content_len
        {
            match embedder.embed(content).await {
                Ok(raw_vec) => {
                    counters.embedded += 1;
                    Some(vectors::encode(&raw_vec))
                }
                Err(_) => None,
            }
        } else {
            None
        };

        let tokens = tokenizer.extract(content);

        let mut meta = serde_json::Map::new();
        meta.insert(
            "source".to_string(),
            serde_json::Value::String(path.display().to_string()),
        );
        if !tokens.is_empty() {
            meta.insert("semantic_tokens".to_string(), serde_json::to_value(&tokens)?);
        }
        if let Some(section) = section_label(content) {
            meta.insert("section".to_string(), serde_json::Value::String(section));
        }
        for (key, value) in &fm {
            if key != "title" && key != "type" {
                meta.entry(key.clone())
                    .or_insert_with(|| serde_json::Value::String(value.clone()));
            }
        }

        let title = fm
            .get("title")
            .cloned()
            .or_else(|| section_label(content))
            .unwrap_or_else(|| stem.to_string());

        let node = Node {
            id: box_id.clone(),
            kind,
            title: Some(title),
            content: Some(content.to_string()),
            domain: GraphDomain::Experience,
            layer: GraphLayer::Note,
            embedding,
            hash: Some(current_hash),
            meta: serde_json::Value::Object(meta),
        };
        store.insert_node(&node).await?;

        if previous.is_some() {
            counters.updated += 1;
        } else {
            counters.added += 1;
        }

        let report = weaver.weave(store, gate, &box_id, content).await?;
        counters.edges += report.added;
        counters.rejections += report.rejections.len();
        for reason in &report.rejections {
            println!("⚠️  gate: {}", reason);
        }
    }

    Ok(counters)
}

/// Resolve a file into `(box_id, content)` pairs.
///
/// Marked files are split on their inline locus markers, which own box
/// identity. An unmarked file runs through the bento
/// boxer: one resulting box keeps the filename slug as its id; several get
/// ledger-minted locus ids and the markers are written back to the source
/// file so the ids survive later edits (a read-only source degrades to
/// in-memory ids with a warning).
async fn segment_file(
    config: &Config,
    ledger: &LocusLedger,
    path: &Path,
    front: Option<&str>,
    body: &str,
    stem: &str,
) -> Result<Vec<(String, String)>> {
    if let Some(boxes) = segment_by_markers(body) {
        return Ok(boxes);
    }

    let contents = boxer::segment(body, config.boxing.max_tokens);

    match contents.len() {
        0 => Ok(Vec::new()),
        1 => Ok(vec![(slugify(stem), contents.into_iter().next().unwrap())]),
        _ => {
            let mut boxes = Vec::with_capacity(contents.len());
            for content in contents {
                let id = ledger.get_or_mint(&content_hash(&content)).await?;
                boxes.push((id, content));
            }

            let mut rewritten = String::new();
            if let Some(front) = front {
                rewritten.push_str(front);
                rewritten.push('\n');
            }
            for (id, content) in &boxes {
                rewritten.push_str(&format!("<!-- locus:{} -->\n", id));
                rewritten.push_str(content);
                rewritten.push_str("\n\n");
            }
            if let Err(e) = std::fs::write(path, &rewritten) {
                println!(
                    "⚠️  {}: cannot persist locus markers ({}); ids are run-local",
                    path.display(),
                    e
                );
            }

            Ok(boxes)
        }
    }
}

/// Split a body on inline locus markers; `None` when the file is unmarked.
fn segment_by_markers(body: &str) -> Option<Vec<(String, String)>> {
    let markers: Vec<(String, std::ops::Range<usize>)> = locus_line_re()
        .captures_iter(body)
        .map(|c| {
            let whole = c.get(0).unwrap();
            (c[1].to_string(), whole.start()..whole.end())
        })
        .collect();

    if markers.is_empty() {
        return None;
    }

    let mut boxes = Vec::with_capacity(markers.len());
    for (i, (id, range)) in markers.iter().enumerate() {
        let end = markers
            .get(i + 1)
            .map(|(_, next)| next.start)
            .unwrap_or(body.len());
        boxes.push((id.clone(), body[range.end..end].to_string()));
    }
    Some(boxes)
}

/// First heading's text, when the box opens with one.
fn section_label(content: &str) -> Option<String> {
    let first = content.lines().next()?;
    let stripped = first.trim_start_matches('#');
    if stripped.len() != first.len() && stripped.starts_with(' ') {
        Some(stripped.trim().to_string())
    } else {
        None
    }
}
