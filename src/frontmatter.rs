//! YAML-style frontmatter handling.
//!
//! Only the `key: value` per-line subset is supported; anything richer is
//! treated as opaque and carried through verbatim. A malformed line is
//! skipped, never fatal.

use crate::models::Frontmatter;

/// Split a document into `(frontmatter_block, body)`. The frontmatter block
/// includes both `---` delimiter lines and the trailing newline; `body` is
/// the exact remainder of the source.
pub fn split(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content.strip_prefix("---") else {
        return (None, content);
    };
    if !rest.starts_with('\n') && !rest.starts_with("\r\n") {
        return (None, content);
    }

    // Find the closing delimiter on its own line.
    let mut offset = 3;
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        if line.trim_end() == "---" && offset > 4 {
            return (Some(&content[..offset]), &content[offset..]);
        }
    }
    (None, content)
}

/// Parse `key: value` pairs out of a frontmatter block.
pub fn parse(block: &str) -> Frontmatter {
    let mut map = Frontmatter::new();
    for line in block.lines() {
        let line = line.trim();
        if line == "---" || line.is_empty() {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !key.is_empty() && !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}
