//! Round-trip verification for boxed files.
//!
//! Boxing must never lose content: stripping `<!-- locus:… -->` and
//! `<!-- tags:… -->` markers from the boxed file and whitespace-normalizing
//! must reproduce the whitespace-normalized source. The source side passes
//! through the same heading repair the boxer applied, so deterministic
//! normalization does not read as divergence.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::frontmatter;
use crate::normalize::normalize;

fn locus_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*<!--\s*locus:[a-zA-Z0-9-]+\s*-->\s*$").unwrap())
}

fn tags_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*<!--\s*tags:.*-->\s*$").unwrap())
}

/// Strip marker lines from boxed content.
pub fn strip_markers(content: &str) -> String {
    let without_locus = locus_marker_re().replace_all(content, "");
    tags_marker_re().replace_all(&without_locus, "").into_owned()
}

/// Collapse all whitespace runs to single spaces.
fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `boxed` is a content-faithful boxing of `source`.
pub fn verify(source: &str, source_stem: &str, boxed: &str) -> bool {
    let (front, body) = frontmatter::split(source);
    let mut expected = String::new();
    if let Some(front) = front {
        expected.push_str(front);
    }
    expected.push_str(&normalize(body, source_stem));

    squash(&expected) == squash(&strip_markers(boxed))
}

/// The `audit` command. Returns `true` when the boxed file is equivalent.
pub fn run_audit(source_path: &Path, boxed_path: &Path) -> Result<bool> {
    let source = std::fs::read_to_string(source_path)
        .with_context(|| format!("cannot read source file: {}", source_path.display()))?;
    let boxed = std::fs::read_to_string(boxed_path)
        .with_context(|| format!("cannot read boxed file: {}", boxed_path.display()))?;

    let stem = source_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled");

    let equivalent = verify(&source, stem, &boxed);
    if equivalent {
        println!(
            "✅ audit: {} ≡ {}",
            source_path.display(),
            boxed_path.display()
        );
    } else {
        println!(
            "❌ audit: content divergence between {} and {}",
            source_path.display(),
            boxed_path.display()
        );
    }
    Ok(equivalent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_locus_and_tags_markers() {
        let boxed = "<!-- locus:abc-123 -->\n# Title\n\nBody.\n<!-- tags: [CITES: term-x] -->\n";
        let stripped = strip_markers(boxed);
        assert!(!stripped.contains("locus"));
        assert!(!stripped.contains("tags:"));
        assert!(stripped.contains("# Title"));
        assert!(stripped.contains("Body."));
    }

    #[test]
    fn faithful_boxing_verifies() {
        let source = "# Doc\n\nAlpha beta.\n\n## Section\n\nGamma delta.\n";
        let boxed = "<!-- locus:a1 -->\n# Doc\n\nAlpha beta.\n\n<!-- locus:b2 -->\n## Section\n\nGamma delta.\n";
        assert!(verify(source, "doc", boxed));
    }

    #[test]
    fn dropped_content_is_detected() {
        let source = "# Doc\n\nAlpha beta.\n\n## Section\n\nGamma delta.\n";
        let boxed = "<!-- locus:a1 -->\n# Doc\n\nAlpha beta.\n";
        assert!(!verify(source, "doc", boxed));
    }

    #[test]
    fn heading_repair_is_not_divergence() {
        // The source is headless; the boxer synthesized a title from the stem.
        let source = "Opening prose without a title.\n";
        let boxed = "<!-- locus:a1 -->\n# Field Notes\n\nOpening prose without a title.\n";
        assert!(verify(source, "field-notes", boxed));
    }

    #[test]
    fn frontmatter_survives_the_round_trip() {
        let source = "---\ntitle: Kept\n---\n# Doc\n\nBody.\n";
        let boxed = "---\ntitle: Kept\n---\n\n<!-- locus:x -->\n# Doc\n\nBody.\n";
        assert!(verify(source, "doc", boxed));
    }
}
