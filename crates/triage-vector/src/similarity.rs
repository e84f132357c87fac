//! Similarity engine: neighbor lists for stored tickets.
//!
//! Links are derived on demand from the vector store and never persisted.
//! They are not symmetric: B can appear in A's top-k while A is missing
//! from B's, because each list is cut at k from its own point of view.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, instrument};
use triage_types::SimilarityLink;

use crate::error::VectorError;
use crate::store::{Neighbor, VectorStore};

/// Cosine similarity in [-1, 1]; 0.0 for zero or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Finds tickets similar to a stored ticket or to a raw vector.
pub struct SimilarityEngine<'a> {
    store: &'a VectorStore,
}

impl<'a> SimilarityEngine<'a> {
    pub fn new(store: &'a VectorStore) -> Self {
        Self { store }
    }

    /// Top `k` tickets similar to `ticket_id` scoring at least `min_score`.
    ///
    /// Fails with [`VectorError::NotEmbedded`] when the ticket has no
    /// stored vector and with [`VectorError::ModelVersionMismatch`] when its
    /// vector came from another model version.
    pub fn find_similar(
        &self,
        ticket_id: &str,
        k: usize,
        min_score: f32,
    ) -> Result<Vec<SimilarityLink>, VectorError> {
        self.find_similar_excluding(ticket_id, k, min_score, &HashSet::new())
    }

    /// Like [`Self::find_similar`], also skipping `exclude` (e.g. tickets the
    /// caller has already linked).
    #[instrument(skip(self, exclude), fields(project = %self.store.project()))]
    pub fn find_similar_excluding(
        &self,
        ticket_id: &str,
        k: usize,
        min_score: f32,
        exclude: &HashSet<String>,
    ) -> Result<Vec<SimilarityLink>, VectorError> {
        let record = self
            .store
            .get(ticket_id)?
            .ok_or_else(|| VectorError::NotEmbedded(ticket_id.to_string()))?;

        if record.model_version != self.store.model_version() {
            return Err(VectorError::ModelVersionMismatch {
                ticket_id: ticket_id.to_string(),
                expected: self.store.model_version().to_string(),
                found: record.model_version,
            });
        }

        let mut excluded = exclude.clone();
        excluded.insert(ticket_id.to_string());

        let neighbors = self.neighbors_of_vector(&record.values, k, min_score, &excluded)?;
        let now = Utc::now();
        let links: Vec<SimilarityLink> = neighbors
            .into_iter()
            .map(|n| SimilarityLink {
                source: ticket_id.to_string(),
                target: n.ticket_id,
                score: n.score,
                discovered_at: now,
            })
            .collect();

        debug!(ticket = %ticket_id, links = links.len(), "Found similar tickets");
        Ok(links)
    }

    /// Top `k` stored tickets similar to an arbitrary vector (e.g. freshly
    /// embedded text), filtered by `min_score`.
    pub fn neighbors_of_vector(
        &self,
        vector: &[f32],
        k: usize,
        min_score: f32,
        exclude: &HashSet<String>,
    ) -> Result<Vec<Neighbor>, VectorError> {
        let mut neighbors = self.store.query_neighbors(vector, k, exclude)?;
        // Sorted descending, so everything after the first miss also misses
        if let Some(cut) = neighbors.iter().position(|n| n.score < min_score) {
            neighbors.truncate(cut);
        }
        Ok(neighbors)
    }
}
