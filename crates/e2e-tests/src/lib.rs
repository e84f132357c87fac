//! End-to-end test infrastructure for backlog-triage.
//!
//! Provides a shared TestHarness, ticket fixtures, embedders that fail on
//! demand, and snapshot helpers for comparing stored state across runs.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use triage_embeddings::{EmbeddingError, EmbeddingModel, HashingEmbedder, ModelInfo};
use triage_orchestrator::Organizer;
use triage_storage::Storage;
use triage_themes::Theme;
use triage_types::{OrganizerConfig, Ticket};
use triage_vector::VectorStore;

/// Shared test harness: a temp directory holding one RocksDB instance.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub storage: Arc<Storage>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let storage =
            Arc::new(Storage::open(temp_dir.path()).expect("Failed to open test storage"));
        Self {
            _temp_dir: temp_dir,
            storage,
        }
    }

    /// Organizer over this harness's storage with the hashing model.
    pub fn organizer(&self) -> Organizer {
        self.organizer_with(test_config(), Arc::new(HashingEmbedder::default()))
    }

    pub fn organizer_with(
        &self,
        config: OrganizerConfig,
        embedder: Arc<dyn EmbeddingModel>,
    ) -> Organizer {
        Organizer::new(config, self.storage.clone(), embedder).expect("Failed to build organizer")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Default config with retries short enough for tests.
pub fn test_config() -> OrganizerConfig {
    let mut config = OrganizerConfig::default();
    config.batch.max_retries = 2;
    config.batch.initial_backoff_ms = 1;
    config.batch.max_backoff_ms = 5;
    config
}

fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

/// Ticket with fixed timestamps so repeated fixtures compare equal.
pub fn ticket(id: &str, project: &str, title: &str) -> Ticket {
    let mut ticket = Ticket::new(id, project, title);
    ticket.created_at = fixed_time();
    ticket.updated_at = fixed_time();
    ticket
}

/// Three payment timeout tickets and one unrelated UI ticket.
pub fn payment_tickets() -> Vec<Ticket> {
    vec![
        ticket("PAY-1", "PAY", "Payment timeout during checkout"),
        ticket("PAY-2", "PAY", "Checkout payment fails with timeout"),
        ticket("PAY-3", "PAY", "Payment gateway timeout on checkout"),
        ticket("PAY-4", "PAY", "UI color contrast too low"),
    ]
}

/// Ten tickets in one project: payments, login, dark mode and build agents.
/// The fourth ticket is the only one mentioning unreadable colors.
pub fn backlog() -> Vec<Ticket> {
    [
        ("BL-01", "Payment timeout during checkout"),
        ("BL-02", "Login fails after password reset"),
        ("BL-03", "Checkout payment fails with timeout"),
        ("BL-04", "Dark mode colors unreadable in settings"),
        ("BL-05", "Password reset leads to login failure"),
        ("BL-06", "Payment gateway timeout on checkout"),
        ("BL-07", "Dark mode toggle resets colors"),
        ("BL-08", "Login page fails after reset of password"),
        ("BL-09", "Build agent disk full"),
        ("BL-10", "Disk full on build agent again"),
    ]
    .into_iter()
    .map(|(id, title)| ticket(id, "BL", title))
    .collect()
}

/// Hashing embedder that reports the model as unavailable for any text
/// containing `marker`, either forever or for a fixed number of calls.
pub struct FlakyEmbedder {
    inner: HashingEmbedder,
    marker: String,
    failures_left: Option<AtomicU32>,
    failed_calls: AtomicU32,
}

impl FlakyEmbedder {
    pub fn permanent(marker: &str) -> Self {
        Self {
            inner: HashingEmbedder::default(),
            marker: marker.to_string(),
            failures_left: None,
            failed_calls: AtomicU32::new(0),
        }
    }

    pub fn transient(marker: &str, failures: u32) -> Self {
        Self {
            failures_left: Some(AtomicU32::new(failures)),
            ..Self::permanent(marker)
        }
    }

    pub fn failed_calls(&self) -> u32 {
        self.failed_calls.load(Ordering::SeqCst)
    }

    fn should_fail(&self) -> bool {
        match &self.failures_left {
            None => true,
            Some(left) => left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok(),
        }
    }
}

impl EmbeddingModel for FlakyEmbedder {
    fn info(&self) -> &ModelInfo {
        self.inner.info()
    }

    fn embed(&self, text: &str) -> Result<triage_embeddings::Embedding, EmbeddingError> {
        if text.contains(&self.marker) && self.should_fail() {
            self.failed_calls.fetch_add(1, Ordering::SeqCst);
            return Err(EmbeddingError::Unavailable(format!(
                "model offline for {:?}",
                self.marker
            )));
        }
        self.inner.embed(text)
    }
}

/// Hashing embedder reporting a different model version.
pub struct RenamedEmbedder {
    inner: HashingEmbedder,
    info: ModelInfo,
}

impl RenamedEmbedder {
    pub fn new(version: &str) -> Self {
        let inner = HashingEmbedder::default();
        let info = ModelInfo {
            version: version.to_string(),
            ..inner.info().clone()
        };
        Self { inner, info }
    }
}

impl EmbeddingModel for RenamedEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<triage_embeddings::Embedding, EmbeddingError> {
        self.inner.embed(text)
    }
}

/// Theme contents without timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeSnapshot {
    pub theme_id: String,
    pub label: String,
    pub keywords: Vec<String>,
    pub members: Vec<String>,
    pub centroid: Vec<f32>,
}

pub fn theme_snapshot(themes: &[Theme]) -> Vec<ThemeSnapshot> {
    themes
        .iter()
        .map(|t| ThemeSnapshot {
            theme_id: t.theme_id.clone(),
            label: t.label.clone(),
            keywords: t.keywords.clone(),
            members: t.member_ids.iter().cloned().collect(),
            centroid: t.centroid.clone(),
        })
        .collect()
}

/// Member ids per theme, themes in id order.
pub fn partition(themes: &[Theme]) -> Vec<Vec<String>> {
    themes
        .iter()
        .map(|t| t.member_ids.iter().cloned().collect())
        .collect()
}

/// (ticket id, values, model version) for every active-version vector.
pub fn vector_snapshot(store: &VectorStore) -> Vec<(String, Vec<f32>, String)> {
    store
        .all_vectors()
        .map(|r| {
            let r = r.expect("Failed to read vector");
            (r.ticket_id, r.values, r.model_version)
        })
        .collect()
}

/// Owned id list, for comparing against partitions.
pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
