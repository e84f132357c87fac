//! # triage-embeddings
//!
//! Turns ticket text into fixed-dimension, L2-normalized vectors.
//!
//! ## Features
//! - Ticket text composition and cleanup (HTML, markdown, whitespace)
//! - Head-keeping truncation to the model's input limit
//! - Local inference via Candle with all-MiniLM-L6-v2 (384 dimensions)
//! - A deterministic feature-hashing model that needs no download
//!
//! Every model reports a version string in [`ModelInfo`]; vectors are only
//! comparable when produced under the same version.

pub mod cache;
pub mod candle;
pub mod error;
pub mod hashing;
pub mod model;
pub mod preprocess;

use triage_types::ModelConfig;

pub use crate::candle::CandleEmbedder;
pub use cache::{get_or_download_model, ModelCache, ModelPaths, DEFAULT_MODEL_REPO, MODEL_FILES};
pub use error::EmbeddingError;
pub use hashing::HashingEmbedder;
pub use model::{Embedding, EmbeddingModel, ModelInfo};
pub use preprocess::{compose_ticket_text, tokenize, truncate_head};

/// Model id selecting [`HashingEmbedder`].
pub const HASHING_MODEL_ID: &str = "hashing";

/// Build the model named by `config.model_id`.
///
/// `"hashing"` builds a [`HashingEmbedder`] of the configured dimension;
/// anything else is treated as a Hugging Face repo id for [`CandleEmbedder`].
pub fn load_model(config: &ModelConfig) -> Result<Box<dyn EmbeddingModel>, EmbeddingError> {
    if config.model_id == HASHING_MODEL_ID {
        return Ok(Box::new(HashingEmbedder::new(config.dimension)?));
    }
    let cache = ModelCache {
        repo_id: config.model_id.clone(),
        ..ModelCache::default()
    };
    Ok(Box::new(CandleEmbedder::load(&cache)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_hashing_model_from_config() {
        let config = ModelConfig {
            dimension: 128,
            ..ModelConfig::default()
        };
        let model = load_model(&config).unwrap();
        assert_eq!(model.info().dimension, 128);
        assert_eq!(model.info().version, "hashing-v1-d128");
    }
}
