//! Deterministic repair of malformed heading structure.
//!
//! Three heuristics, applied in order:
//!
//! 1. **Headless** — no `# H1` before the first content line (YAML
//!    frontmatter excluded): synthesize one from the Title-Cased filename.
//! 2. **Shouting** — every `# H1` after the first is demoted to `## H2`.
//! 3. **Deep nesting** — `####` through `######` headings become bold
//!    inline text.
//!
//! Lines inside fenced code blocks are never touched.

/// Repair `content`, using `filename` (without extension) for a synthesized
/// title when the document is headless.
pub fn normalize(content: &str, filename: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let body_start = frontmatter_end(&lines);

    let mut out: Vec<String> = lines[..body_start].iter().map(|s| s.to_string()).collect();

    let mut in_fence = false;
    let mut seen_h1 = false;
    let mut synthesized = false;

    for line in &lines[body_start..] {
        let trimmed = line.trim_start();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            out.push(line.to_string());
            continue;
        }
        if in_fence {
            out.push(line.to_string());
            continue;
        }

        let is_h1 = line.starts_with("# ");
        let is_content = !line.trim().is_empty();

        if !seen_h1 && !synthesized && is_content && !is_h1 {
            out.push(format!("# {}", title_case(filename)));
            out.push(String::new());
            synthesized = true;
            seen_h1 = true;
        }

        if is_h1 {
            if seen_h1 {
                // Shouting: only one H1 per document.
                out.push(format!("#{}", line));
            } else {
                seen_h1 = true;
                out.push(line.to_string());
            }
            continue;
        }

        if let Some(text) = deep_heading_text(line) {
            out.push(format!("**{}**", text));
            continue;
        }

        out.push(line.to_string());
    }

    let mut result = out.join("\n");
    if content.ends_with('\n') {
        result.push('\n');
    }
    result
}

/// Index of the first line after an optional leading YAML frontmatter block.
fn frontmatter_end(lines: &[&str]) -> usize {
    if lines.first().map(|l| l.trim()) != Some("---") {
        return 0;
    }
    for (i, line) in lines.iter().enumerate().skip(1) {
        if line.trim() == "---" {
            return i + 1;
        }
    }
    0
}

/// The text of a depth-4..6 heading, or `None`.
fn deep_heading_text(line: &str) -> Option<&str> {
    for marker in ["###### ", "##### ", "#### "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest.trim_end());
        }
    }
    None
}

/// `daily-ops_debrief` → `Daily Ops Debrief`.
fn title_case(filename: &str) -> String {
    filename
        .split(|c: char| c == '-' || c == '_' || c == ' ')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
