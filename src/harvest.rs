//! The `harvest` command: report unknown `tag-<slug>` stubs.
//!
//! Scans experience sources for legacy stubs whose slug resolves to nothing
//! in the lexicon and emits a Markdown report, so the stubs can either be
//! promoted to lexicon entries or cleaned up.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::Config;
use crate::sources;
use crate::weaver::{parse_legacy_stubs, LexiconIndex};

/// Build the report body. Returns `None` when every stub resolved.
pub fn harvest_report(
    files: &[(String, String)],
    index: &LexiconIndex,
) -> Option<String> {
    // slug → files it appears in (with counts)
    let mut unknown: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();

    for (path, content) in files {
        for slug in parse_legacy_stubs(content) {
            if index.resolve(&slug).is_none() {
                *unknown
                    .entry(slug)
                    .or_default()
                    .entry(path.clone())
                    .or_default() += 1;
            }
        }
    }

    if unknown.is_empty() {
        return None;
    }

    let mut report = String::from("# Unknown tag stubs\n\n");
    report.push_str(&format!(
        "{} unresolved stub(s) found.\n\n",
        unknown.len()
    ));
    for (slug, occurrences) in &unknown {
        let total: usize = occurrences.values().sum();
        report.push_str(&format!("## `tag-{}` ({} occurrence(s))\n\n", slug, total));
        for (path, count) in occurrences {
            report.push_str(&format!("- {} ×{}\n", path, count));
        }
        report.push('\n');
    }
    Some(report)
}

pub fn run_harvest(config: &Config, dir: Option<&Path>) -> Result<i32> {
    let entries = sources::load_lexicon(&config.paths.sources.persona.lexicon)
        .unwrap_or_else(|e| {
            eprintln!("⚠️  {}", e);
            Vec::new()
        });
    let index = LexiconIndex::build(&entries);

    let dirs: Vec<std::path::PathBuf> = match dir {
        Some(d) => vec![d.to_path_buf()],
        None => config
            .paths
            .sources
            .experience
            .iter()
            .map(|s| s.path.clone())
            .collect(),
    };

    let mut files = Vec::new();
    for dir in &dirs {
        for path in sources::walk_markdown_files(dir)? {
            match std::fs::read_to_string(&path) {
                Ok(content) => files.push((path.display().to_string(), content)),
                Err(e) => eprintln!("⚠️  skipping {}: {}", path.display(), e),
            }
        }
    }

    match harvest_report(&files, &index) {
        Some(report) => {
            println!("{}", report);
            Ok(0)
        }
        None => {
            println!("✅ no unknown tag stubs across {} file(s)", files.len());
            Ok(0)
        }
    }
}
