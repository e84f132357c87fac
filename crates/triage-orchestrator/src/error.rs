//! Organizer error types and their classification.

use thiserror::Error;
use triage_embeddings::EmbeddingError;
use triage_storage::StorageError;
use triage_tags::TagError;
use triage_themes::ThemeError;
use triage_types::{ErrorClass, TriageError};
use triage_vector::VectorError;

/// Errors surfaced by the organizer.
#[derive(Debug, Error)]
pub enum OrganizerError {
    /// Configuration rejected at construction
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid ticket: {0}")]
    InvalidTicket(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    #[error("Theme error: {0}")]
    Theme(#[from] ThemeError),

    #[error("Tag error: {0}")]
    Tag(#[from] TagError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A blocking worker panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),
}

impl From<TriageError> for OrganizerError {
    fn from(err: TriageError) -> Self {
        match err {
            TriageError::Config(msg) => OrganizerError::Config(msg),
            other => OrganizerError::InvalidTicket(other.to_string()),
        }
    }
}

impl OrganizerError {
    /// How the caller should react to this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            OrganizerError::Config(_) | OrganizerError::InvalidTicket(_) => ErrorClass::Input,
            OrganizerError::Embedding(e) => embedding_class(e),
            OrganizerError::Vector(e) => vector_class(e),
            OrganizerError::Theme(e) => theme_class(e),
            OrganizerError::Tag(e) => match e {
                TagError::Vector(e) => vector_class(e),
                TagError::Theme(e) => theme_class(e),
                TagError::InvalidRule { .. } => ErrorClass::Input,
            },
            OrganizerError::Storage(e) => storage_class(e),
            OrganizerError::Task(_) => ErrorClass::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

fn embedding_class(err: &EmbeddingError) -> ErrorClass {
    match err {
        e if e.is_transient() => ErrorClass::Transient,
        EmbeddingError::EmptyInput
        | EmbeddingError::InvalidInput(_)
        | EmbeddingError::DimensionMismatch { .. } => ErrorClass::Input,
        _ => ErrorClass::Fatal,
    }
}

fn vector_class(err: &VectorError) -> ErrorClass {
    match err {
        VectorError::NotEmbedded(_)
        | VectorError::InvalidInput(_)
        | VectorError::DimensionMismatch { .. } => ErrorClass::Input,
        VectorError::ModelVersionMismatch { .. } => ErrorClass::Consistency,
        VectorError::Corrupt(_) => ErrorClass::Fatal,
        VectorError::Storage(e) => storage_class(e),
    }
}

fn theme_class(err: &ThemeError) -> ErrorClass {
    match err {
        ThemeError::Storage(e) => storage_class(e),
        ThemeError::Vector(e) => vector_class(e),
        ThemeError::Corrupt(_) => ErrorClass::Fatal,
        ThemeError::Cancelled | ThemeError::DeadlineExceeded => ErrorClass::Transient,
    }
}

fn storage_class(err: &StorageError) -> ErrorClass {
    if err.is_transient() {
        ErrorClass::Transient
    } else {
        ErrorClass::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        let cases = [
            (OrganizerError::from(EmbeddingError::EmptyInput), ErrorClass::Input),
            (
                OrganizerError::from(EmbeddingError::Unavailable("busy".into())),
                ErrorClass::Transient,
            ),
            (
                OrganizerError::from(EmbeddingError::ModelNotFound("x".into())),
                ErrorClass::Fatal,
            ),
            (
                OrganizerError::from(VectorError::NotEmbedded("PAY-1".into())),
                ErrorClass::Input,
            ),
            (
                OrganizerError::from(VectorError::ModelVersionMismatch {
                    ticket_id: "PAY-1".into(),
                    expected: "v2".into(),
                    found: "v1".into(),
                }),
                ErrorClass::Consistency,
            ),
            (
                OrganizerError::from(ThemeError::Corrupt("bad json".into())),
                ErrorClass::Fatal,
            ),
            (
                OrganizerError::from(TagError::Theme(ThemeError::Vector(
                    VectorError::Corrupt("x".into()),
                ))),
                ErrorClass::Fatal,
            ),
            (
                OrganizerError::from(TriageError::InvalidTicket("id".into())),
                ErrorClass::Input,
            ),
        ];
        for (err, class) in cases {
            assert_eq!(err.class(), class, "{err}");
        }
    }

    #[test]
    fn test_only_transient_is_transient() {
        assert!(OrganizerError::from(EmbeddingError::Download("503".into())).is_transient());
        assert!(!OrganizerError::Config("k".into()).is_transient());
    }
}
