//! Ticket records as supplied by the tracker integration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TriageError;

/// A ticket as seen by the engine.
///
/// The engine never mutates a ticket. Label additions are proposed as
/// [`crate::TagSuggestion`]s and applied (or not) by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// External identifier, unique within the project (e.g. "PAY-123")
    pub id: String,

    /// Project the ticket belongs to. All stored state is scoped by it.
    pub project_key: String,

    /// Ticket title / summary
    pub title: String,

    /// Free-form body text, may contain HTML or markdown
    #[serde(default)]
    pub body: String,

    /// Labels currently applied to the ticket
    #[serde(default)]
    pub labels: Vec<String>,

    /// Components currently set on the ticket
    #[serde(default)]
    pub components: Vec<String>,

    /// Parent epic, if any
    #[serde(default)]
    pub parent_key: Option<String>,

    /// Defaults to the time of deserialization when absent
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Create a ticket with no body, labels or parent, stamped now.
    pub fn new(
        id: impl Into<String>,
        project_key: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            project_key: project_key.into(),
            title: title.into(),
            body: String::new(),
            labels: Vec::new(),
            components: Vec::new(),
            parent_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the body text.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the existing labels.
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Set the existing components.
    pub fn with_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.components = components.into_iter().map(Into::into).collect();
        self
    }

    /// Set the parent epic.
    pub fn with_parent(mut self, parent_key: impl Into<String>) -> Self {
        self.parent_key = Some(parent_key.into());
        self
    }

    /// Check the identifiers are usable as storage key components.
    ///
    /// Ids and project keys must be non-empty and free of ':' (the key
    /// separator) so that project-scoped prefix scans stay exact.
    pub fn validate(&self) -> Result<(), TriageError> {
        validate_key_part("project_key", &self.project_key)?;
        validate_key_part("id", &self.id)?;
        Ok(())
    }
}

/// Shared check for any identifier that ends up inside a storage key.
pub fn validate_key_part(field: &str, value: &str) -> Result<(), TriageError> {
    if value.trim().is_empty() {
        return Err(TriageError::InvalidTicket(format!("{field} must not be empty")));
    }
    if value.contains(':') {
        return Err(TriageError::InvalidTicket(format!(
            "{field} must not contain ':', got {value:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let ticket = Ticket::new("PAY-1", "PAY", "Payment timeout")
            .with_body("Checkout hangs")
            .with_labels(["bug", "payments"])
            .with_components(["Checkout"])
            .with_parent("PAY-100");

        assert_eq!(ticket.body, "Checkout hangs");
        assert_eq!(ticket.labels, vec!["bug", "payments"]);
        assert_eq!(ticket.components, vec!["Checkout"]);
        assert_eq!(ticket.parent_key.as_deref(), Some("PAY-100"));
        assert!(ticket.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_separator_in_ids() {
        let ticket = Ticket::new("PAY:1", "PAY", "x");
        assert!(matches!(ticket.validate(), Err(TriageError::InvalidTicket(_))));

        let ticket = Ticket::new("PAY-1", "", "x");
        assert!(ticket.validate().is_err());
    }

    #[test]
    fn test_deserialize_with_missing_optional_fields() {
        let json = r#"{
            "id": "WEB-7",
            "project_key": "WEB",
            "title": "Contrast too low",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        }"#;
        let ticket: Ticket = serde_json::from_str(json).unwrap();
        assert!(ticket.body.is_empty());
        assert!(ticket.labels.is_empty());
        assert!(ticket.components.is_empty());
        assert!(ticket.parent_key.is_none());
    }
}
