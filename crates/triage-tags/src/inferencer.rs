//! Tag inference: gather votes from each signal and combine them.
//!
//! Each signal's confidence is scaled by its configured weight and the
//! scaled values are combined as independent evidence:
//! `1 - (1 - w1*c1) * (1 - w2*c2) * ...`. The suggestion reports the
//! signal with the largest scaled contribution as its source.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, instrument};
use triage_themes::ThemeStore;
use triage_types::{
    ComponentSuggestion, EpicSuggestion, TagConfig, TagSource, TagSuggestion, TagWeights,
};
use triage_vector::{SimilarityEngine, TicketDoc, VectorError, VectorStore};

use crate::canonical::Canonicalizer;
use crate::components::suggest_components;
use crate::epic::suggest_epic;
use crate::error::TagError;
use crate::rules::RuleSet;

/// One signal's opinion about one canonical label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVote {
    pub label: String,
    pub confidence: f32,
    /// Summed neighbor similarity behind the vote, used to order equal
    /// confidences
    pub support: f32,
}

impl LabelVote {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
            support: 0.0,
        }
    }
}

/// Tag, epic and component suggestions for one ticket.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Inference {
    pub tags: Vec<TagSuggestion>,
    pub epic: Option<EpicSuggestion>,
    pub components: Vec<ComponentSuggestion>,
}

/// Suggests labels for tickets of one project.
pub struct TagInferencer<'a> {
    vectors: &'a VectorStore,
    themes: &'a ThemeStore,
    config: &'a TagConfig,
    rules: &'a RuleSet,
    canon: Canonicalizer,
    neighbor_min_score: f32,
}

impl<'a> TagInferencer<'a> {
    pub fn new(
        vectors: &'a VectorStore,
        themes: &'a ThemeStore,
        config: &'a TagConfig,
        rules: &'a RuleSet,
    ) -> Self {
        Self {
            vectors,
            themes,
            config,
            rules,
            canon: Canonicalizer::new(&config.synonyms),
            neighbor_min_score: 0.0,
        }
    }

    /// Neighbors below this score do not vote.
    pub fn with_neighbor_min_score(mut self, min_score: f32) -> Self {
        self.neighbor_min_score = min_score;
        self
    }

    pub fn infer_tags(&self, ticket_id: &str) -> Result<Vec<TagSuggestion>, TagError> {
        Ok(self.infer(ticket_id)?.tags)
    }

    /// Label suggestions plus parent epic and component suggestions, from
    /// one neighbor query. The ticket must be stored with its doc.
    #[instrument(skip(self), fields(project = %self.vectors.project()))]
    pub fn infer(&self, ticket_id: &str) -> Result<Inference, TagError> {
        let doc = self
            .vectors
            .get_doc(ticket_id)?
            .ok_or_else(|| VectorError::NotEmbedded(ticket_id.to_string()))?;

        let links = SimilarityEngine::new(self.vectors).find_similar(
            ticket_id,
            self.config.neighbor_k,
            self.neighbor_min_score,
        )?;
        let mut neighbors = Vec::with_capacity(links.len());
        for link in links {
            if let Some(neighbor) = self.vectors.get_doc(&link.target)? {
                neighbors.push((neighbor, link.score));
            }
        }

        let signals = [
            (TagSource::SimilarTicket, self.similar_ticket_votes(&neighbors)),
            (TagSource::Theme, self.theme_votes(ticket_id)?),
            (TagSource::ContentRule, self.rules.matches(&doc.title, &doc.body)),
        ];
        let existing: BTreeSet<String> = doc
            .labels
            .iter()
            .filter_map(|l| self.canon.canonical(l))
            .collect();
        let tags = combine_votes(ticket_id, &signals, self.config, &existing);

        // A ticket that already has a parent gets no epic suggestion
        let epic = match doc.parent_key {
            Some(_) => None,
            None => suggest_epic(&neighbors),
        };
        let components =
            suggest_components(&neighbors, &doc.components, self.config.max_components);

        debug!(
            ticket = %ticket_id,
            neighbors = neighbors.len(),
            tags = tags.len(),
            epic = epic.as_ref().map(|e| e.epic_key.as_str()),
            components = components.len(),
            "Inferred tags"
        );
        Ok(Inference {
            tags,
            epic,
            components,
        })
    }

    /// Labels carried by at least `min_votes` neighbors; confidence is the
    /// fraction of neighbors carrying the label.
    fn similar_ticket_votes(&self, neighbors: &[(TicketDoc, f32)]) -> Vec<LabelVote> {
        let mut tally: BTreeMap<String, (usize, f32)> = BTreeMap::new();
        for (doc, score) in neighbors {
            for label in self.canonical_set(&doc.labels) {
                let entry = tally.entry(label).or_insert((0, 0.0));
                entry.0 += 1;
                entry.1 += score;
            }
        }

        let min_votes = self.config.min_votes.max(1);
        tally
            .into_iter()
            .filter(|(_, (count, _))| *count >= min_votes)
            .map(|(label, (count, support))| LabelVote {
                label,
                confidence: count as f32 / neighbors.len() as f32,
                support,
            })
            .collect()
    }

    /// Label frequency among the other members of the ticket's theme.
    fn theme_votes(&self, ticket_id: &str) -> Result<Vec<LabelVote>, TagError> {
        let Some(membership) = self.themes.get_membership(ticket_id)? else {
            return Ok(Vec::new());
        };
        let Some(theme) = self.themes.get_theme(&membership.theme_id)? else {
            return Ok(Vec::new());
        };

        let mut members = 0usize;
        let mut tally: BTreeMap<String, usize> = BTreeMap::new();
        for member_id in theme.member_ids.iter().filter(|id| *id != ticket_id) {
            let Some(doc) = self.vectors.get_doc(member_id)? else {
                continue;
            };
            members += 1;
            for label in self.canonical_set(&doc.labels) {
                *tally.entry(label).or_insert(0) += 1;
            }
        }

        Ok(tally
            .into_iter()
            .map(|(label, count)| LabelVote::new(label, count as f32 / members as f32))
            .collect())
    }

    fn canonical_set(&self, labels: &[String]) -> BTreeSet<String> {
        labels
            .iter()
            .filter_map(|l| self.canon.canonical(l))
            .collect()
    }
}

fn weight_for(weights: &TagWeights, source: TagSource) -> f32 {
    match source {
        TagSource::SimilarTicket => weights.similar_ticket,
        TagSource::Theme => weights.theme,
        TagSource::ContentRule => weights.content_rule,
    }
}

#[derive(Default)]
struct Tally {
    miss: f32,
    best: Option<(TagSource, f32)>,
    support: f32,
}

/// Merge per-signal votes into ranked suggestions.
///
/// Labels in `existing` are dropped, as are combined confidences below
/// `config.min_confidence`. Results are ordered by confidence, then
/// support, then label, and capped at `config.max_suggestions`.
pub fn combine_votes(
    ticket_id: &str,
    signals: &[(TagSource, Vec<LabelVote>)],
    config: &TagConfig,
    existing: &BTreeSet<String>,
) -> Vec<TagSuggestion> {
    let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();
    for (source, votes) in signals {
        let weight = weight_for(&config.weights, *source);
        for vote in votes {
            if existing.contains(&vote.label) {
                continue;
            }
            let scaled = (vote.confidence * weight).clamp(0.0, 1.0);
            let tally = tallies.entry(vote.label.as_str()).or_insert(Tally {
                miss: 1.0,
                ..Tally::default()
            });
            tally.miss *= 1.0 - scaled;
            tally.support += vote.support;
            if tally.best.map_or(true, |(_, top)| scaled > top) {
                tally.best = Some((*source, scaled));
            }
        }
    }

    let mut ranked: Vec<(TagSuggestion, f32)> = tallies
        .into_iter()
        .filter_map(|(label, tally)| {
            let (source, _) = tally.best?;
            let confidence = 1.0 - tally.miss;
            if confidence <= 0.0 || confidence < config.min_confidence {
                return None;
            }
            let suggestion = TagSuggestion {
                ticket_id: ticket_id.to_string(),
                label: label.to_string(),
                confidence,
                source,
            };
            Some((suggestion, tally.support))
        })
        .collect();

    ranked.sort_by(|(a, a_support), (b, b_support)| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b_support.total_cmp(a_support))
            .then_with(|| a.label.cmp(&b.label))
    });
    ranked.truncate(config.max_suggestions);
    ranked.into_iter().map(|(s, _)| s).collect()
}
