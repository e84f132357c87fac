//! Error types shared across the triage crates.

use thiserror::Error;

/// Errors raised while loading settings or validating shared types.
#[derive(Debug, Error)]
pub enum TriageError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A ticket record failed validation
    #[error("Invalid ticket: {0}")]
    InvalidTicket(String),
}
