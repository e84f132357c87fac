//! Label canonicalization.
//!
//! Folding lowercases a label and joins its words with single hyphens, so
//! `Needs Review`, `needs_review` and `needs--review` all become
//! `needs-review`. Synonyms map folded variants onto one folded label.

use std::collections::{BTreeMap, HashMap};

/// Folds labels and resolves configured synonyms.
#[derive(Debug, Clone, Default)]
pub struct Canonicalizer {
    synonyms: HashMap<String, String>,
}

impl Canonicalizer {
    pub fn new(synonyms: &BTreeMap<String, String>) -> Self {
        let synonyms = synonyms
            .iter()
            .filter_map(|(variant, canonical)| Some((fold(variant)?, fold(canonical)?)))
            .collect();
        Self { synonyms }
    }

    /// Canonical form of `label`, or None if nothing is left after folding.
    pub fn canonical(&self, label: &str) -> Option<String> {
        let folded = fold(label)?;
        Some(self.synonyms.get(&folded).cloned().unwrap_or(folded))
    }
}

fn fold(label: &str) -> Option<String> {
    let words: Vec<String> = label
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join("-"))
    }
}
