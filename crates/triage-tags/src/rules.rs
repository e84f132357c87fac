//! Content rules: fixed-confidence labels from text patterns.

use regex::{Regex, RegexBuilder};
use triage_types::ContentRule;

use crate::canonical::Canonicalizer;
use crate::error::TagError;
use crate::inferencer::LabelVote;

#[derive(Debug, Clone)]
struct CompiledRule {
    label: String,
    patterns: Vec<Regex>,
    confidence: f32,
}

/// Compiled rules for one project.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile `rules`; patterns match case-insensitively.
    pub fn compile<'a>(
        rules: impl IntoIterator<Item = &'a ContentRule>,
        canon: &Canonicalizer,
    ) -> Result<Self, TagError> {
        let mut compiled = Vec::new();
        for rule in rules {
            let label = canon.canonical(&rule.label).ok_or_else(|| TagError::InvalidRule {
                label: rule.label.clone(),
                message: "label is empty after normalization".to_string(),
            })?;
            let patterns = rule
                .patterns
                .iter()
                .map(|p| {
                    RegexBuilder::new(p)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| TagError::InvalidRule {
                            label: rule.label.clone(),
                            message: e.to_string(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            compiled.push(CompiledRule {
                label,
                patterns,
                confidence: rule.confidence,
            });
        }
        Ok(Self { rules: compiled })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// One vote per matching label; when several rules give the same label
    /// the highest confidence wins.
    pub fn matches(&self, title: &str, body: &str) -> Vec<LabelVote> {
        let mut votes: Vec<LabelVote> = Vec::new();
        for rule in &self.rules {
            let hit = rule
                .patterns
                .iter()
                .any(|p| p.is_match(title) || p.is_match(body));
            if !hit {
                continue;
            }
            match votes.iter_mut().find(|v| v.label == rule.label) {
                Some(vote) => vote.confidence = vote.confidence.max(rule.confidence),
                None => votes.push(LabelVote::new(rule.label.clone(), rule.confidence)),
            }
        }
        votes
    }
}
