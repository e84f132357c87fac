use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// No content left after cleanup
    #[error("Empty input: nothing to embed")]
    EmptyInput,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The model cannot serve right now; the same call may succeed later
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to download model: {0}")]
    Download(String),

    #[error("Model files missing or unreadable: {0}")]
    ModelNotFound(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Inference failed: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EmbeddingError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EmbeddingError::Unavailable(_) | EmbeddingError::Download(_)
        )
    }
}
