//! Tag inference error types.

use thiserror::Error;
use triage_themes::ThemeError;
use triage_vector::VectorError;

/// Errors that can occur during tag inference.
#[derive(Debug, Error)]
pub enum TagError {
    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    #[error("Theme error: {0}")]
    Theme(#[from] ThemeError),

    /// A content rule pattern failed to compile
    #[error("Invalid rule {label:?}: {message}")]
    InvalidRule { label: String, message: String },
}
