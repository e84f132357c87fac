//! Local sentence-transformer inference with Candle.
//!
//! A BERT encoder (all-MiniLM-L6-v2 unless configured otherwise) runs on
//! CPU. Token vectors are mean-pooled over the attention mask, then
//! L2-normalized. Input past [`MAX_SEQ_LENGTH`] tokens keeps its head; the
//! tokenizer truncates before adding `[CLS]`/`[SEP]`, so both survive.

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{PaddingParams, Tokenizer, TruncationDirection, TruncationParams};
use tracing::{debug, info};

use crate::cache::{get_or_download_model, ModelCache, ModelPaths};
use crate::error::EmbeddingError;
use crate::model::{ensure_non_empty, Embedding, EmbeddingModel, ModelInfo};

/// Output dimension of all-MiniLM-L6-v2
pub const EMBEDDING_DIM: usize = 384;

pub const MAX_SEQ_LENGTH: usize = 256;

pub struct CandleEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    info: ModelInfo,
}

/// "sentence-transformers/all-MiniLM-L6-v2" -> "all-MiniLM-L6-v2"
fn short_name(repo_id: &str) -> &str {
    repo_id.rsplit('/').next().unwrap_or(repo_id)
}

/// Masked mean over the sequence axis: `[batch, seq, hidden]` to
/// `[batch, hidden]`. Padding positions contribute nothing.
fn mean_pool(hidden: &Tensor, mask: &Tensor) -> Result<Tensor, EmbeddingError> {
    let weights = mask
        .to_dtype(DType::F32)?
        .unsqueeze(2)?
        .broadcast_as(hidden.shape())?;
    let summed = hidden.broadcast_mul(&weights)?.sum(1)?;
    let counts = weights.sum(1)?.clamp(1e-9, f64::MAX)?;
    Ok(summed.broadcast_div(&counts)?)
}

/// Head-keeping truncation to [`MAX_SEQ_LENGTH`] (special tokens included)
/// and padding to the longest encoding of each batch.
fn configure_tokenizer(tokenizer: &mut Tokenizer) -> Result<(), EmbeddingError> {
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_SEQ_LENGTH,
            direction: TruncationDirection::Right,
            ..Default::default()
        }))
        .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;
    tokenizer.with_padding(Some(PaddingParams::default()));
    Ok(())
}

impl CandleEmbedder {
    /// Load from the local cache, downloading missing files first.
    pub fn load(cache: &ModelCache) -> Result<Self, EmbeddingError> {
        let paths = get_or_download_model(cache)?;
        Self::from_paths(short_name(&cache.repo_id), &paths)
    }

    pub fn from_paths(name: &str, paths: &ModelPaths) -> Result<Self, EmbeddingError> {
        info!(model = %name, "Loading embedding model");
        let device = Device::Cpu;

        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(&paths.config)?)
            .map_err(|e| EmbeddingError::ModelNotFound(format!("bad config.json: {e}")))?;
        let mut tokenizer = Tokenizer::from_file(&paths.tokenizer)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;
        configure_tokenizer(&mut tokenizer)?;

        // SAFETY: the cache owns the weights file and never rewrites it in place.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[paths.weights.clone()], DType::F32, &device)?
        };
        let model = BertModel::load(vb, &config)?;

        let info = ModelInfo {
            name: name.to_string(),
            version: format!("{name}@mean-pool-v2-seq{MAX_SEQ_LENGTH}"),
            dimension: config.hidden_size,
            max_sequence_length: MAX_SEQ_LENGTH,
        };
        info!(version = %info.version, dimension = info.dimension, "Model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            info,
        })
    }

    /// Token ids and attention mask as `[batch, len]` tensors. The
    /// tokenizer has already truncated and padded every encoding to `len`.
    fn encode(&self, texts: &[&str]) -> Result<(Tensor, Tensor), EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let len = encodings.first().map_or(0, |e| e.get_ids().len());
        let mut ids = Vec::with_capacity(texts.len() * len);
        let mut mask = Vec::with_capacity(texts.len() * len);
        for encoding in &encodings {
            if encoding.get_ids().len() != len {
                return Err(EmbeddingError::Tokenizer(format!(
                    "unpadded encoding: {} tokens, batch has {len}",
                    encoding.get_ids().len()
                )));
            }
            ids.extend_from_slice(encoding.get_ids());
            mask.extend_from_slice(encoding.get_attention_mask());
        }

        let shape = (texts.len(), len);
        Ok((
            Tensor::from_vec(ids, shape, &self.device)?,
            Tensor::from_vec(mask, shape, &self.device)?,
        ))
    }
}

impl EmbeddingModel for CandleEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidInput("model returned no embedding".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        texts.iter().try_for_each(|t| ensure_non_empty(t))?;

        let (input_ids, attention_mask) = self.encode(texts)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let rows: Vec<Vec<f32>> = mean_pool(&hidden, &attention_mask)?.to_vec2()?;

        let embeddings: Vec<Embedding> = rows.into_iter().map(Embedding::new).collect();
        if let Some(bad) = embeddings
            .iter()
            .find(|e| e.dimension() != self.info.dimension)
        {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.info.dimension,
                actual: bad.dimension(),
            });
        }

        debug!(count = embeddings.len(), "Embedded batch");
        Ok(embeddings)
    }
}
