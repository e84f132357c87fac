//! Per-project state: stores, compiled rules and the project lock.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;
use triage_storage::Storage;
use triage_tags::{Canonicalizer, RuleSet};
use triage_themes::ThemeStore;
use triage_types::OrganizerConfig;
use triage_vector::VectorStore;

use crate::error::OrganizerError;

/// Everything the organizer needs for one project.
///
/// Mutations (upserts, theme assignment, reprocess) happen while holding
/// [`ProjectContext::lock`]; reads may proceed without it because the
/// vector store fences its own writes.
pub struct ProjectContext {
    key: String,
    vectors: VectorStore,
    themes: Arc<ThemeStore>,
    rules: RuleSet,
    lock: Mutex<()>,
}

impl ProjectContext {
    pub(crate) fn new(
        storage: Arc<Storage>,
        key: &str,
        dimension: usize,
        model_version: &str,
        config: &OrganizerConfig,
    ) -> Result<Self, OrganizerError> {
        let themes = Arc::new(ThemeStore::new(storage.clone(), key));
        let vectors =
            VectorStore::new(storage, key, dimension, model_version)?.with_cascade(themes.clone());
        let canon = Canonicalizer::new(&config.tags.synonyms);
        let rules = RuleSet::compile(config.rules_for(key), &canon)?;
        debug!(project = key, rules = rules.len(), "Opened project context");

        Ok(Self {
            key: key.to_string(),
            vectors,
            themes,
            rules,
            lock: Mutex::new(()),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn vectors(&self) -> &VectorStore {
        &self.vectors
    }

    pub fn themes(&self) -> &ThemeStore {
        &self.themes
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Enter the project's single-writer region.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}
