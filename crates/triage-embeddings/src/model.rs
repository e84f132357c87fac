//! The model seam: what every embedder provides.

use crate::error::EmbeddingError;

/// A unit-length vector for one piece of ticket text.
///
/// An all-zero input stays all-zero; models treat that as "nothing to
/// embed" rather than storing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// L2-normalize `values`.
    pub fn new(mut values: Vec<f32>) -> Self {
        let norm = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            values.iter_mut().for_each(|x| *x /= norm);
        }
        Self { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// Dot product, which is the cosine for two unit vectors. Vectors of
    /// different dimension score 0.0.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.dimension() != other.dimension() {
            return 0.0;
        }
        self.values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a * b)
            .sum()
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}

/// Identity of a loaded model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Short name, e.g. "all-MiniLM-L6-v2"
    pub name: String,
    /// Stored with every vector; vectors only compare under equal versions
    pub version: String,
    pub dimension: usize,
    /// Token limit; longer input keeps its head
    pub max_sequence_length: usize,
}

/// Text-to-vector model.
///
/// Implementations are shared across the runtime's blocking pool, so they
/// must be `Send + Sync`, and must be deterministic: the same text under
/// the same version always yields the same vector. Text with nothing to
/// embed fails with [`EmbeddingError::EmptyInput`].
pub trait EmbeddingModel: Send + Sync {
    fn info(&self) -> &ModelInfo;

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// One vector per text, in order. Fails as a whole if any text fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.embed_batch(&refs)
    }
}

pub(crate) fn ensure_non_empty(text: &str) -> Result<(), EmbeddingError> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::EmptyInput);
    }
    Ok(())
}
