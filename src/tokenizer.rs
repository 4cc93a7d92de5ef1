//! Lexicon-aware entity and concept extraction.
//!
//! Greedy longest-match tokenizer seeded from the lexicon during Phase 1.
//! A candidate term must pass two tests: a cheap lowercase containment
//! check, then a word-boundary regex against the original text (so "flow"
//! never fires inside "overflow"). Matches are recorded in their original
//! casing. Search keys are ordered longest-first and claim their character
//! spans, which is what makes "deep work protocol" win over "deep work".

use regex::Regex;
use std::collections::HashMap;

use crate::models::{LexiconEntry, SemanticTokens};

/// Category a vocabulary term maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermTag {
    Protocol,
    Concept,
    Organization,
}

struct SearchKey {
    term: String,
    pattern: Regex,
    tag: TermTag,
}

/// Greedy longest-match extractor over the loaded vocabulary.
#[derive(Default)]
pub struct LexiconTokenizer {
    vocabulary: HashMap<String, TermTag>,
    keys: Vec<SearchKey>,
}

impl LexiconTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        !self.keys.is_empty()
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Seed the vocabulary. Each entry contributes its title, its id, and a
    /// hyphen→space variant of its id.
    pub fn load(&mut self, entries: &[LexiconEntry]) {
        for entry in entries {
            let tag = classify(entry);

            let mut terms: Vec<String> = Vec::new();
            if let Some(title) = &entry.title {
                terms.push(title.clone());
            }
            terms.push(entry.id.clone());
            terms.push(entry.id.replace('-', " "));

            for term in terms {
                let lower = term.trim().to_lowercase();
                if lower.is_empty() {
                    continue;
                }
                self.vocabulary.entry(lower).or_insert(tag);
            }
        }

        self.rebuild_keys();
    }

    fn rebuild_keys(&mut self) {
        let mut terms: Vec<(&String, &TermTag)> = self.vocabulary.iter().collect();
        // Longest first; lexicographic tiebreak keeps extraction deterministic.
        terms.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));

        self.keys = terms
            .into_iter()
            .filter_map(|(term, tag)| {
                let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(term))).ok()?;
                Some(SearchKey {
                    term: term.clone(),
                    pattern,
                    tag: *tag,
                })
            })
            .collect();
    }

    /// Extract lexicon-aligned tokens from one box of text.
    pub fn extract(&self, text: &str) -> SemanticTokens {
        let mut tokens = SemanticTokens::default();
        if self.keys.is_empty() || text.is_empty() {
            return tokens;
        }

        let lower = text.to_lowercase();
        let mut claimed: Vec<(usize, usize)> = Vec::new();

        for key in &self.keys {
            if !lower.contains(&key.term) {
                continue;
            }

            let mut recorded = false;
            for found in key.pattern.find_iter(text) {
                let span = (found.start(), found.end());
                if claimed.iter().any(|c| span.0 >= c.0 && span.1 <= c.1) {
                    continue;
                }
                claimed.push(span);
                if !recorded {
                    push_unique(bucket(&mut tokens, key.tag), found.as_str());
                    recorded = true;
                }
            }
        }

        tokens
    }
}

fn classify(entry: &LexiconEntry) -> TermTag {
    if entry.kind.as_deref() == Some("operational-heuristic") {
        TermTag::Protocol
    } else if entry.category.as_deref() == Some("Tool") {
        TermTag::Organization
    } else {
        TermTag::Concept
    }
}

fn bucket(tokens: &mut SemanticTokens, tag: TermTag) -> &mut Vec<String> {
    match tag {
        TermTag::Protocol => &mut tokens.protocols,
        TermTag::Concept => &mut tokens.concepts,
        TermTag::Organization => &mut tokens.organizations,
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        list.push(value.to_string());
    }
}
