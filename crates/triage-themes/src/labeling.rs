//! Theme labels from member ticket titles.
//!
//! A term scores `member_df * idf`, where `member_df` counts member titles
//! containing the term and `idf = ln((N + 1) / (df + 1)) + 1` is computed
//! over every title in the project. Terms common to the members but rare in
//! the project rank first; equal scores fall back to alphabetical order.

use std::collections::{BTreeSet, HashMap};

use triage_embeddings::tokenize;
use triage_vector::{VectorError, VectorStore};

/// Label used when member titles contain no usable terms.
pub const FALLBACK_LABEL: &str = "untitled";

/// Keywords kept on a theme.
pub const MAX_KEYWORDS: usize = 5;

/// Per-term document frequency over a project's titles.
#[derive(Debug, Clone, Default)]
pub struct DocFrequencies {
    doc_count: usize,
    counts: HashMap<String, usize>,
}

impl DocFrequencies {
    pub fn new<'a>(titles: impl IntoIterator<Item = &'a str>) -> Self {
        let mut freqs = Self::default();
        for title in titles {
            freqs.add(title);
        }
        freqs
    }

    pub fn add(&mut self, title: &str) {
        self.doc_count += 1;
        for term in distinct_terms(title) {
            *self.counts.entry(term).or_insert(0) += 1;
        }
    }

    /// Undo an earlier [`DocFrequencies::add`] of the same title.
    pub fn remove(&mut self, title: &str) {
        self.doc_count = self.doc_count.saturating_sub(1);
        for term in distinct_terms(title) {
            if let Some(count) = self.counts.get_mut(&term) {
                *count -= 1;
                if *count == 0 {
                    self.counts.remove(&term);
                }
            }
        }
    }

    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    /// Smoothed inverse document frequency.
    pub fn idf(&self, term: &str) -> f32 {
        let df = self.counts.get(term).copied().unwrap_or(0) as f32;
        let n = self.doc_count as f32;
        ((n + 1.0) / (df + 1.0)).ln() + 1.0
    }
}

/// Every title of a project by ticket id, with their term frequencies.
///
/// Loaded once per write session and updated as tickets are stored, so
/// labeling a theme does not rescan the project's docs each time.
#[derive(Debug, Clone, Default)]
pub struct TitleIndex {
    titles: HashMap<String, String>,
    frequencies: DocFrequencies,
}

impl TitleIndex {
    /// Read every stored ticket doc of the project.
    pub fn load(vectors: &VectorStore) -> Result<Self, VectorError> {
        let mut index = Self::default();
        for doc in vectors.all_docs()? {
            index.upsert(&doc.ticket_id, &doc.title);
        }
        Ok(index)
    }

    /// Record a ticket's current title, replacing any earlier one.
    pub fn upsert(&mut self, ticket_id: &str, title: &str) {
        if let Some(old) = self.titles.insert(ticket_id.to_string(), title.to_string()) {
            self.frequencies.remove(&old);
        }
        self.frequencies.add(title);
    }

    pub fn remove(&mut self, ticket_id: &str) {
        if let Some(old) = self.titles.remove(ticket_id) {
            self.frequencies.remove(&old);
        }
    }

    pub fn title(&self, ticket_id: &str) -> Option<&str> {
        self.titles.get(ticket_id).map(String::as_str)
    }

    pub fn frequencies(&self) -> &DocFrequencies {
        &self.frequencies
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

/// Generated label plus the ranked terms behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeLabel {
    pub label: String,
    pub keywords: Vec<String>,
}

/// Builds labels from the `label_terms` best-scoring title terms.
#[derive(Debug, Clone)]
pub struct ThemeLabeler {
    label_terms: usize,
}

impl ThemeLabeler {
    pub fn new(label_terms: usize) -> Self {
        Self {
            label_terms: label_terms.max(1),
        }
    }

    pub fn label<'a>(
        &self,
        member_titles: impl IntoIterator<Item = &'a str>,
        population: &DocFrequencies,
    ) -> ThemeLabel {
        let ranked = rank_terms(member_titles, population);
        if ranked.is_empty() {
            return ThemeLabel {
                label: FALLBACK_LABEL.to_string(),
                keywords: Vec::new(),
            };
        }

        let label = ranked
            .iter()
            .take(self.label_terms)
            .map(|(term, _)| term.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let keywords = ranked
            .into_iter()
            .take(MAX_KEYWORDS.max(self.label_terms))
            .map(|(term, _)| term)
            .collect();
        ThemeLabel { label, keywords }
    }
}

fn distinct_terms(title: &str) -> BTreeSet<String> {
    tokenize(title).into_iter().collect()
}

fn rank_terms<'a>(
    member_titles: impl IntoIterator<Item = &'a str>,
    population: &DocFrequencies,
) -> Vec<(String, f32)> {
    let mut member_df: HashMap<String, usize> = HashMap::new();
    for title in member_titles {
        for term in distinct_terms(title) {
            *member_df.entry(term).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, f32)> = member_df
        .into_iter()
        .map(|(term, count)| {
            let score = count as f32 * population.idf(&term);
            (term, score)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_idf_is_smoothed() {
        let freqs = DocFrequencies::new(["payment timeout", "payment declined"]);
        assert_eq!(freqs.doc_count(), 2);
        // df 2 of 2: ln(3/3) + 1
        assert!((freqs.idf("payment") - 1.0).abs() < 1e-6);
        // unseen: ln(3/1) + 1
        assert!((freqs.idf("login") - (3.0f32.ln() + 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_label_prefers_shared_distinctive_terms() {
        let titles = [
            "Payment timeout during checkout",
            "Checkout payment fails with timeout",
            "Payment gateway timeout at checkout",
            "UI color contrast too low on settings page",
            "Login fails after password reset",
        ];
        let population = DocFrequencies::new(titles);
        let labeler = ThemeLabeler::new(3);

        let label = labeler.label(titles[..3].iter().copied(), &population);
        // All three members share the same three terms; ties go alphabetical
        assert_eq!(label.label, "checkout payment timeout");
        assert_eq!(label.keywords[..3], ["checkout", "payment", "timeout"]);
    }

    #[test]
    fn test_ties_are_alphabetical() {
        let population = DocFrequencies::new(["zeta alpha"]);
        let label = ThemeLabeler::new(2).label(["zeta alpha"], &population);
        assert_eq!(label.label, "alpha zeta");
    }

    #[test]
    fn test_fallback_label() {
        let population = DocFrequencies::new(["the and of"]);
        let label = ThemeLabeler::new(3).label(["the and of"], &population);
        assert_eq!(label.label, FALLBACK_LABEL);
        assert!(label.keywords.is_empty());
    }

    #[test]
    fn test_title_index_tracks_replacements() {
        let mut index = TitleIndex::default();
        index.upsert("PAY-1", "Payment timeout");
        index.upsert("PAY-2", "Payment declined");
        index.upsert("PAY-1", "Login timeout");
        index.upsert("PAY-3", "Refund stuck");
        index.remove("PAY-3");

        let fresh = DocFrequencies::new(["Login timeout", "Payment declined"]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.title("PAY-1"), Some("Login timeout"));
        assert_eq!(index.frequencies().doc_count(), fresh.doc_count());
        for term in ["login", "payment", "timeout", "declined", "refund"] {
            assert_eq!(index.frequencies().idf(term), fresh.idf(term), "{term}");
        }
    }

    #[test]
    fn test_repeated_word_counts_once_per_title() {
        let population = DocFrequencies::new(["crash crash crash", "slow page", "slow query"]);
        let label = ThemeLabeler::new(1).label(["crash crash crash", "slow page"], &population);
        // crash: 1 * (ln(4/2)+1) = 1.69; slow: 1 * (ln(4/3)+1) = 1.29
        assert_eq!(label.label, "crash");
    }
}
