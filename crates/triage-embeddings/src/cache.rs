//! Local model file cache.
//!
//! Model files are fetched once from the Hugging Face Hub and kept in a
//! per-repo directory under the user cache dir, so later runs work offline.
//! Files are written under a `.partial` name and renamed into place, so an
//! interrupted download is never mistaken for a complete one.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::EmbeddingError;

/// Default model repository on Hugging Face
pub const DEFAULT_MODEL_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Files a BERT sentence-transformer needs
pub const MODEL_FILES: &[&str] = &["config.json", "tokenizer.json", "model.safetensors"];

/// Where model files for one repo live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCache {
    pub cache_dir: PathBuf,
    pub repo_id: String,
}

impl Default for ModelCache {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("backlog-triage")
            .join("models");
        Self {
            cache_dir,
            repo_id: DEFAULT_MODEL_REPO.to_string(),
        }
    }
}

impl ModelCache {
    pub fn new(cache_dir: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            repo_id: repo_id.into(),
        }
    }

    /// Directory for this repo; `org/name` becomes `org_name`.
    pub fn model_dir(&self) -> PathBuf {
        self.cache_dir.join(self.repo_id.replace('/', "_"))
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.model_dir().join(filename)
    }

    /// Files from [`MODEL_FILES`] not yet on disk.
    pub fn missing_files(&self) -> Vec<&'static str> {
        MODEL_FILES
            .iter()
            .copied()
            .filter(|f| !self.file_path(f).exists())
            .collect()
    }

    pub fn is_cached(&self) -> bool {
        self.missing_files().is_empty()
    }

    fn paths(&self) -> ModelPaths {
        ModelPaths {
            config: self.file_path("config.json"),
            tokenizer: self.file_path("tokenizer.json"),
            weights: self.file_path("model.safetensors"),
        }
    }
}

/// Resolved model file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

/// Return model file paths, downloading whatever is missing.
pub fn get_or_download_model(cache: &ModelCache) -> Result<ModelPaths, EmbeddingError> {
    let missing = cache.missing_files();
    if missing.is_empty() {
        debug!(path = ?cache.model_dir(), "Using cached model");
        return Ok(cache.paths());
    }

    info!(repo = %cache.repo_id, files = ?missing, "Downloading model files");
    std::fs::create_dir_all(cache.model_dir())?;

    let api = hf_hub::api::sync::Api::new().map_err(|e| EmbeddingError::Download(e.to_string()))?;
    let repo = api.model(cache.repo_id.clone());

    for filename in missing {
        let source = repo
            .get(filename)
            .map_err(|e| EmbeddingError::Download(format!("{}: {}", filename, e)))?;
        install_file(&source, &cache.file_path(filename))?;
        debug!(file = filename, "Installed model file");
    }

    Ok(cache.paths())
}

fn install_file(source: &Path, dest: &Path) -> Result<(), EmbeddingError> {
    let mut partial = dest.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);
    std::fs::copy(source, &partial)?;
    std::fs::rename(&partial, dest)?;
    Ok(())
}
