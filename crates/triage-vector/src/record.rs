//! Persisted vector and ticket doc records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use triage_types::Ticket;

/// One ticket's embedding as stored in the `vectors` column family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub ticket_id: String,
    pub project_key: String,
    /// L2-normalized embedding
    pub values: Vec<f32>,
    /// Version string of the model that produced `values`
    pub model_version: String,
    pub updated_at: DateTime<Utc>,
}

impl VectorRecord {
    /// Same vector from the same model; a rewrite would change nothing.
    pub fn same_content(&self, other: &VectorRecord) -> bool {
        self.model_version == other.model_version && self.values == other.values
    }
}

/// The parts of a ticket the engine needs after embedding: title words for
/// theme labels, labels for tag votes, components and parent for their
/// own suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketDoc {
    pub ticket_id: String,
    pub project_key: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub parent_key: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Ticket> for TicketDoc {
    fn from(ticket: &Ticket) -> Self {
        Self {
            ticket_id: ticket.id.clone(),
            project_key: ticket.project_key.clone(),
            title: ticket.title.clone(),
            body: ticket.body.clone(),
            labels: ticket.labels.clone(),
            components: ticket.components.clone(),
            parent_key: ticket.parent_key.clone(),
            updated_at: ticket.updated_at,
        }
    }
}
