//! Source discovery and persona artifact loading.
//!
//! Experience sources are plain directories of Markdown; persona sources
//! are JSON artifacts (the lexicon and the directive catalog). Artifact
//! parsing is lenient per entry: a malformed element is warned about and
//! skipped, never fatal to the phase.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::models::{DirectiveEntry, LexiconEntry};

/// All `.md` files under `dir`, recursively, sorted for deterministic
/// processing order.
pub fn walk_markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_markdown(dir, &mut files)
        .with_context(|| format!("cannot scan source directory: {}", dir.display()))?;
    files.sort();
    Ok(files)
}

fn collect_markdown(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_markdown(&path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("md") {
            out.push(path);
        }
    }
    Ok(())
}

/// Load the lexicon artifact. Entries that fail to deserialize are skipped
/// with a warning.
pub fn load_lexicon(path: &Path) -> Result<Vec<LexiconEntry>> {
    load_entries(path, "lexicon")
}

/// Load the enriched directive catalog.
pub fn load_directives(path: &Path) -> Result<Vec<DirectiveEntry>> {
    load_entries(path, "directive catalog")
}

fn load_entries<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {} artifact: {}", what, path.display()))?;
    let raw: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("cannot parse {} artifact: {}", what, path.display()))?;

    let items = raw
        .as_array()
        .with_context(|| format!("{} artifact is not a JSON array", what))?;

    let mut entries = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match serde_json::from_value::<T>(item.clone()) {
            Ok(entry) => entries.push(entry),
            Err(e) => eprintln!("⚠️  {} entry {} skipped: {}", what, i, e),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn walks_markdown_recursively_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.md"), "b").unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::write(dir.path().join("sub/c.md"), "c").unwrap();
        fs::write(dir.path().join("ignored.txt"), "x").unwrap();

        let files = walk_markdown_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["a.md", "b.md", "sub/c.md"]);
    }

    #[test]
    fn malformed_lexicon_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexicon.json");
        fs::write(
            &path,
            r#"[
                {"id": "term-good", "title": "Good"},
                {"title": "missing id"},
                {"id": "term-also-good"}
            ]"#,
        )
        .unwrap();

        let entries = load_lexicon(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "term-good");
    }

    #[test]
    fn non_array_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"not": "an array"}"#).unwrap();
        assert!(load_lexicon(&path).is_err());
    }
}
