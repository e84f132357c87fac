//! Vector store error types.

use thiserror::Error;
use triage_storage::StorageError;

/// Errors that can occur during vector operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Vector length differs from the store's dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The ticket has no stored vector; embed it first
    #[error("Ticket not embedded: {0}")]
    NotEmbedded(String),

    /// A stored vector was produced by a different model version.
    /// The project must be re-embedded before similarity or clustering.
    #[error("Model version mismatch for {ticket_id}: expected {expected}, found {found}; re-embed the project")]
    ModelVersionMismatch {
        ticket_id: String,
        expected: String,
        found: String,
    },

    /// Invalid ticket or project identifier
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persisted record could not be decoded or violates an invariant
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for VectorError {
    fn from(err: serde_json::Error) -> Self {
        VectorError::Corrupt(err.to_string())
    }
}

impl From<triage_types::TriageError> for VectorError {
    fn from(err: triage_types::TriageError) -> Self {
        VectorError::InvalidInput(err.to_string())
    }
}
