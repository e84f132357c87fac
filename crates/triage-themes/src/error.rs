//! Theme error types.

use thiserror::Error;
use triage_storage::StorageError;
use triage_vector::VectorError;

/// Errors that can occur during theme operations.
#[derive(Debug, Error)]
pub enum ThemeError {
    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Vector store error
    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    /// Persisted theme data could not be read
    #[error("Corrupt theme data: {0}")]
    Corrupt(String),

    /// Reprocess was cancelled before commit
    #[error("Reprocess cancelled")]
    Cancelled,

    /// Reprocess ran past its deadline before commit
    #[error("Reprocess deadline exceeded")]
    DeadlineExceeded,
}

impl From<serde_json::Error> for ThemeError {
    fn from(err: serde_json::Error) -> Self {
        ThemeError::Corrupt(err.to_string())
    }
}
