//! Theme data types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of generated theme ids.
pub const THEME_ID_PREFIX: &str = "thm-";

/// A cluster of related tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    /// `thm-{seed ticket id}`, stable across identical runs
    pub theme_id: String,
    pub project_key: String,
    /// Generated human-readable label
    pub label: String,
    /// Top distinctive title terms
    pub keywords: Vec<String>,
    /// Arithmetic mean of member vectors (not normalized)
    pub centroid: Vec<f32>,
    pub member_ids: BTreeSet<String>,
    /// Model version of the vectors the centroid was built from
    pub model_version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Theme {
    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }
}

/// Index entry: which theme a ticket belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub ticket_id: String,
    pub theme_id: String,
    /// Similarity to the centroid at assignment time
    pub similarity: f32,
    pub assigned_at: DateTime<Utc>,
}

/// Deterministic id for a theme seeded by `ticket_id`.
pub fn theme_id_for(ticket_id: &str) -> String {
    format!("{THEME_ID_PREFIX}{ticket_id}")
}
