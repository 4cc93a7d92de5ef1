//! The `box` command: segment a Markdown file into bento boxes and write
//! locus markers back to disk.
//!
//! The written file is frontmatter (verbatim), then for each box a
//! `<!-- locus:ID -->` marker line followed by the box content. Body text
//! passes through the heading normalizer before segmentation; the `audit`
//! command applies the same repair to the source side, so normalization is
//! never mistaken for content loss. With `--tag`, the LLM oracle proposes
//! relationship tags per box, appended as `<!-- tags: … -->` markers.

use anyhow::{Context, Result};
use std::path::Path;

use crate::boxer;
use crate::config::Config;
use crate::frontmatter;
use crate::ledger::{content_hash, LocusLedger};
use crate::llm::LlmClient;
use crate::normalize::normalize;
use crate::sources;

/// How a box relates to document structure, decided at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoxKind {
    /// A single block with no heading of its own.
    Atomic,
    /// A heading-led section; carries the heading label.
    Section(String),
}

pub fn classify_box(content: &str) -> BoxKind {
    let first = content.lines().next().unwrap_or("");
    let trimmed = first.trim_start_matches('#');
    if trimmed.len() != first.len() && trimmed.starts_with(' ') {
        BoxKind::Section(trimmed.trim().to_string())
    } else {
        BoxKind::Atomic
    }
}

pub async fn run_box(
    config: &Config,
    file: &Path,
    output: Option<&Path>,
    tag: bool,
) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read input file: {}", file.display()))?;

    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled");

    let (front, body) = frontmatter::split(&raw);
    let normalized = normalize(body, stem);
    let boxes = boxer::segment(&normalized, config.boxing.max_tokens);

    if boxes.is_empty() {
        println!("⚠️  {}: nothing to box", file.display());
        return Ok(());
    }

    let ledger = LocusLedger::open(&config.ledger_path()).await?;

    let oracle = if tag { LlmClient::from_config(config) } else { None };
    if tag && oracle.is_none() {
        println!("⚠️  no active LLM provider configured; boxing without tags");
    }
    let known_terms: Vec<String> = if oracle.is_some() {
        sources::load_lexicon(&config.paths.sources.persona.lexicon)
            .map(|entries| entries.into_iter().map(|e| e.id).collect())
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    let mut out = String::new();
    if let Some(front) = front {
        out.push_str(front);
        out.push('\n');
    }

    let mut tagged = 0usize;
    for content in &boxes {
        let locus = ledger.get_or_mint(&content_hash(content)).await?;
        out.push_str(&format!("<!-- locus:{} -->\n", locus));
        out.push_str(content);
        out.push('\n');

        if let Some(oracle) = &oracle {
            let section = match classify_box(content) {
                BoxKind::Section(label) => Some(label),
                BoxKind::Atomic => None,
            };
            let tags = oracle
                .auto_tag(content, section.as_deref(), &known_terms)
                .await;
            if !tags.is_empty() {
                let list: Vec<String> = tags
                    .iter()
                    .map(|(rel, target)| format!("[{}: {}]", rel, target))
                    .collect();
                out.push_str(&format!("<!-- tags: {} -->\n", list.join(", ")));
                tagged += 1;
            }
        }
        out.push('\n');
    }

    ledger.close().await;

    let target = output.unwrap_or(file);
    std::fs::write(target, &out)
        .with_context(|| format!("cannot write boxed file: {}", target.display()))?;

    println!(
        "✅ {}: {} boxes → {}{}",
        file.display(),
        boxes.len(),
        target.display(),
        if tag { format!(" ({} tagged)", tagged) } else { String::new() }
    );
    Ok(())
}
