//! Deterministic feature-hashing embedder.
//!
//! Each content word adds 1.0 to a bucket chosen by hashing the word, and
//! each character trigram of the word (padded as `^word$`) adds 0.5 to its
//! own bucket, so inflections like "fail"/"fails"/"failure" still overlap.
//! Buckets are FNV-1a 64 hashes modulo the dimension. The result is
//! L2-normalized and bit-identical across runs and platforms.

use tracing::debug;

use crate::error::EmbeddingError;
use crate::model::{ensure_non_empty, Embedding, EmbeddingModel, ModelInfo};
use crate::preprocess::tokenize;

/// Default embedding dimension
pub const DEFAULT_DIM: usize = 384;

/// Words beyond this many are ignored (head is kept)
pub const MAX_TOKENS: usize = 512;

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(parts: &[&[u8]]) -> u64 {
    let mut hash = FNV_OFFSET;
    for part in parts {
        for byte in *part {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}

/// Content words when there are any. Otherwise every alphanumeric run
/// ("404", "it", "崩"), and for text with no alphanumerics at all, its
/// whitespace-separated pieces. Non-blank text always yields a token.
fn hashable_tokens(text: &str) -> Vec<String> {
    let content = tokenize(text);
    if !content.is_empty() {
        return content;
    }
    let lowered = text.to_lowercase();
    let words: Vec<String> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();
    if !words.is_empty() {
        return words;
    }
    lowered.split_whitespace().map(str::to_string).collect()
}

/// Feature-hashing embedder; no model files, no network.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    info: ModelInfo,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::InvalidInput(
                "dimension must be > 0".to_string(),
            ));
        }
        Ok(Self {
            info: ModelInfo {
                name: "feature-hashing".to_string(),
                version: format!("hashing-v1-d{dimension}"),
                dimension,
                max_sequence_length: MAX_TOKENS,
            },
        })
    }

    fn bucket(&self, hash: u64) -> usize {
        (hash % self.info.dimension as u64) as usize
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            info: ModelInfo {
                name: "feature-hashing".to_string(),
                version: format!("hashing-v1-d{DEFAULT_DIM}"),
                dimension: DEFAULT_DIM,
                max_sequence_length: MAX_TOKENS,
            },
        }
    }
}

impl EmbeddingModel for HashingEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        ensure_non_empty(text)?;

        let mut values = vec![0.0f32; self.info.dimension];
        let tokens = hashable_tokens(text);
        for token in tokens.iter().take(MAX_TOKENS) {
            values[self.bucket(fnv1a(&[b"w:", token.as_bytes()]))] += WORD_WEIGHT;

            let padded: Vec<char> = std::iter::once('^')
                .chain(token.chars())
                .chain(std::iter::once('$'))
                .collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                values[self.bucket(fnv1a(&[b"c:", trigram.as_bytes()]))] += TRIGRAM_WEIGHT;
            }
        }

        let embedding = Embedding::new(values);
        debug!(tokens = tokens.len(), "Hashed text");
        Ok(embedding)
    }
}
