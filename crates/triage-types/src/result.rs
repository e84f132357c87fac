//! Organization outputs: links, theme assignments, tag suggestions and
//! batch reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A derived "source looks like target" edge.
///
/// Links are recomputed from stored vectors on every run and are never
/// edited by hand. `source != target` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityLink {
    pub source: String,
    pub target: String,
    /// Cosine similarity clamped to [0, 1]
    pub score: f32,
    pub discovered_at: DateTime<Utc>,
}

/// Where a tag suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagSource {
    SimilarTicket,
    Theme,
    ContentRule,
}

impl TagSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagSource::SimilarTicket => "similar-ticket",
            TagSource::Theme => "theme",
            TagSource::ContentRule => "content-rule",
        }
    }
}

impl std::fmt::Display for TagSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An advisory label for a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSuggestion {
    pub ticket_id: String,
    /// Canonical label
    pub label: String,
    /// Combined confidence in [0, 1]
    pub confidence: f32,
    /// The signal that contributed most to `confidence`
    pub source: TagSource,
}

/// The theme a ticket currently belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeAssignment {
    pub theme_id: String,
    pub label: String,
    /// Similarity between the ticket and the theme centroid
    pub similarity: f32,
}

/// Parent epic proposed from similar tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpicSuggestion {
    pub epic_key: String,
    pub confidence: f32,
    pub reasoning: String,
}

/// Component proposed from similar tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSuggestion {
    /// Component name as carried by the neighbors
    pub component: String,
    /// Share of the neighbor similarity that voted for this component
    pub confidence: f32,
}

/// Everything the engine decided about one ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationResult {
    pub ticket_id: String,
    pub project_key: String,
    pub similar_links: Vec<SimilarityLink>,
    pub theme_assignment: Option<ThemeAssignment>,
    pub tag_suggestions: Vec<TagSuggestion>,
    #[serde(default)]
    pub epic_suggestion: Option<EpicSuggestion>,
    #[serde(default)]
    pub component_suggestions: Vec<ComponentSuggestion>,
}

/// Coarse classification of failures, used to decide retry behaviour and
/// to report batch items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Caller mistake; never retried
    Input,
    /// Temporary unavailability; retried with backoff
    Transient,
    /// Stored vectors disagree with the active model; re-embed the project
    Consistency,
    /// Corrupt or unreadable state; operator must trigger a full reprocess
    Fatal,
}

/// Per-item status inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Organized { result: OrganizationResult },
    Failed { class: ErrorClass, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub ticket_id: String,
    pub project_key: String,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

impl BatchItem {
    pub fn organized(result: OrganizationResult) -> Self {
        Self {
            ticket_id: result.ticket_id.clone(),
            project_key: result.project_key.clone(),
            outcome: BatchOutcome::Organized { result },
        }
    }

    pub fn failed(
        ticket_id: impl Into<String>,
        project_key: impl Into<String>,
        class: ErrorClass,
        message: impl Into<String>,
    ) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            project_key: project_key.into(),
            outcome: BatchOutcome::Failed {
                class,
                message: message.into(),
            },
        }
    }

    pub fn result(&self) -> Option<&OrganizationResult> {
        match &self.outcome {
            BatchOutcome::Organized { result } => Some(result),
            BatchOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Failed { .. })
    }
}

/// Item-by-item outcome of a batch run, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// ULID identifying this run in logs
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| !i.is_failed()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.iter().filter(|i| i.is_failed()).count()
    }

    pub fn results(&self) -> impl Iterator<Item = &OrganizationResult> {
        self.items.iter().filter_map(BatchItem::result)
    }
}

/// Counts describing a project's stored state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectStats {
    pub project_key: String,
    pub ticket_count: usize,
    pub theme_count: usize,
    /// Embedded tickets without a theme
    pub noise_count: usize,
    pub model_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_result(id: &str) -> OrganizationResult {
        OrganizationResult {
            ticket_id: id.to_string(),
            project_key: "PAY".to_string(),
            similar_links: vec![],
            theme_assignment: None,
            tag_suggestions: vec![],
            epic_suggestion: None,
            component_suggestions: vec![],
        }
    }

    #[test]
    fn test_tag_source_wire_names() {
        assert_eq!(
            serde_json::to_string(&TagSource::SimilarTicket).unwrap(),
            "\"similar-ticket\""
        );
        assert_eq!(
            serde_json::to_string(&TagSource::ContentRule).unwrap(),
            "\"content-rule\""
        );
        assert_eq!(TagSource::Theme.to_string(), "theme");
    }

    #[test]
    fn test_batch_report_counts() {
        let report = BatchReport {
            run_id: ulid::Ulid::new().to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            items: vec![
                BatchItem::organized(sample_result("PAY-1")),
                BatchItem::failed("PAY-2", "PAY", ErrorClass::Transient, "model unavailable"),
                BatchItem::organized(sample_result("PAY-3")),
            ],
        };

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        let ids: Vec<_> = report.results().map(|r| r.ticket_id.as_str()).collect();
        assert_eq!(ids, vec!["PAY-1", "PAY-3"]);
    }

    #[test]
    fn test_batch_item_serializes_status_inline() {
        let item = BatchItem::failed("PAY-2", "PAY", ErrorClass::Input, "empty text");
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["class"], "input");
        assert_eq!(value["ticket_id"], "PAY-2");
    }
}
