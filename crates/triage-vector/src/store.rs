//! Project-scoped vector store.
//!
//! Vectors and ticket docs are written together in one storage batch, so a
//! reader sees either the old pair or the new pair. Reads take a shared
//! fence and writes an exclusive one, which keeps a neighbor query from
//! interleaving with an upsert or delete on the same store.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, instrument};
use triage_storage::column_families::{CF_TICKETS, CF_VECTORS};
use triage_storage::{Storage, StorageBatch, StorageError, TicketKey, VectorKey};
use triage_types::ticket::validate_key_part;
use triage_types::Ticket;

use crate::error::VectorError;
use crate::record::{TicketDoc, VectorRecord};
use crate::scan::VectorScan;
use crate::similarity::cosine_similarity;

/// Records fetched per storage read while scanning.
pub(crate) const PAGE_SIZE: usize = 256;

/// Hook run inside a delete so derived state goes away in the same batch.
pub trait DeleteCascade: Send + Sync {
    /// Add the writes that remove `record` from derived state to `batch`.
    fn on_delete(&self, record: &VectorRecord, batch: &mut StorageBatch)
        -> Result<(), StorageError>;
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Stored state already matched; nothing was written
    Unchanged,
}

/// A query hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub ticket_id: String,
    /// Cosine similarity clamped to [0, 1]
    pub score: f32,
}

/// Heap entry ordered so that the heap's max is the worst candidate:
/// lower score first, then larger ticket id.
struct Candidate(Neighbor);

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .score
            .total_cmp(&self.0.score)
            .then_with(|| self.0.ticket_id.cmp(&other.0.ticket_id))
    }
}

/// Keeps the best `k` neighbors seen so far.
struct TopK {
    k: usize,
    heap: BinaryHeap<Candidate>,
}

impl TopK {
    fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    fn push(&mut self, neighbor: Neighbor) {
        self.heap.push(Candidate(neighbor));
        if self.heap.len() > self.k {
            self.heap.pop();
        }
    }

    /// Best first: descending score, ties by smaller id.
    fn into_sorted(self) -> Vec<Neighbor> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| c.0)
            .collect()
    }
}

/// Vectors and ticket docs for one project.
pub struct VectorStore {
    storage: Arc<Storage>,
    project: String,
    dimension: usize,
    model_version: String,
    fence: RwLock<()>,
    cascades: Vec<Arc<dyn DeleteCascade>>,
}

impl VectorStore {
    pub fn new(
        storage: Arc<Storage>,
        project: impl Into<String>,
        dimension: usize,
        model_version: impl Into<String>,
    ) -> Result<Self, VectorError> {
        let project = project.into();
        validate_key_part("project_key", &project)?;
        if dimension == 0 {
            return Err(VectorError::InvalidInput(
                "dimension must be > 0".to_string(),
            ));
        }
        Ok(Self {
            storage,
            project,
            dimension,
            model_version: model_version.into(),
            fence: RwLock::new(()),
            cascades: Vec::new(),
        })
    }

    /// Register a hook run by [`VectorStore::delete`].
    pub fn with_cascade(mut self, cascade: Arc<dyn DeleteCascade>) -> Self {
        self.cascades.push(cascade);
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Version new vectors are expected to carry and queries compare against.
    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    // The fence guards no data of its own, so a poisoned lock is still usable.
    pub(crate) fn read_fence(&self) -> RwLockReadGuard<'_, ()> {
        self.fence.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_fence(&self) -> RwLockWriteGuard<'_, ()> {
        self.fence.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_dimension(&self, values: &[f32]) -> Result<(), VectorError> {
        if values.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: values.len(),
            });
        }
        Ok(())
    }

    /// Store `values` for `ticket_id`, replacing any prior vector.
    ///
    /// Rewriting an identical vector is a no-op.
    #[instrument(skip(self, values), fields(project = %self.project))]
    pub fn upsert(
        &self,
        ticket_id: &str,
        values: Vec<f32>,
        model_version: &str,
    ) -> Result<UpsertOutcome, VectorError> {
        validate_key_part("id", ticket_id)?;
        let record = VectorRecord {
            ticket_id: ticket_id.to_string(),
            project_key: self.project.clone(),
            values,
            model_version: model_version.to_string(),
            updated_at: Utc::now(),
        };
        self.write_upsert(record, None)
    }

    /// Store a ticket's vector (under the active model version) and its doc
    /// in one atomic write.
    #[instrument(skip(self, ticket, values), fields(project = %self.project, ticket = %ticket.id))]
    pub fn upsert_ticket(
        &self,
        ticket: &Ticket,
        values: Vec<f32>,
    ) -> Result<UpsertOutcome, VectorError> {
        ticket.validate()?;
        if ticket.project_key != self.project {
            return Err(VectorError::InvalidInput(format!(
                "ticket {} belongs to project {}, store is {}",
                ticket.id, ticket.project_key, self.project
            )));
        }
        let record = VectorRecord {
            ticket_id: ticket.id.clone(),
            project_key: self.project.clone(),
            values,
            model_version: self.model_version.clone(),
            updated_at: ticket.updated_at,
        };
        self.write_upsert(record, Some(TicketDoc::from(ticket)))
    }

    fn write_upsert(
        &self,
        record: VectorRecord,
        doc: Option<TicketDoc>,
    ) -> Result<UpsertOutcome, VectorError> {
        self.check_dimension(&record.values)?;

        let _guard = self.write_fence();
        let existing = self.read_record(&record.ticket_id)?;
        let doc_unchanged = match &doc {
            Some(doc) => self.read_doc(&record.ticket_id)?.as_ref() == Some(doc),
            None => true,
        };

        let outcome = match &existing {
            Some(old) if old.same_content(&record) && doc_unchanged => {
                debug!(ticket = %record.ticket_id, "Vector unchanged, skipping write");
                return Ok(UpsertOutcome::Unchanged);
            }
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        };

        let mut batch = StorageBatch::new();
        // Keep the original timestamp when only the doc changed
        let record = match existing {
            Some(old) if old.same_content(&record) => old,
            _ => record,
        };
        batch.put(
            CF_VECTORS,
            VectorKey::new(&self.project, &record.ticket_id).to_bytes(),
            serde_json::to_vec(&record)?,
        );
        if let Some(doc) = &doc {
            batch.put(
                CF_TICKETS,
                TicketKey::new(&self.project, &doc.ticket_id).to_bytes(),
                serde_json::to_vec(doc)?,
            );
        }
        self.storage.write(batch)?;

        debug!(ticket = %record.ticket_id, ?outcome, "Upserted vector");
        Ok(outcome)
    }

    /// Remove a ticket's vector and doc, and run every registered cascade in
    /// the same batch. Returns false when nothing was stored.
    #[instrument(skip(self), fields(project = %self.project))]
    pub fn delete(&self, ticket_id: &str) -> Result<bool, VectorError> {
        let _guard = self.write_fence();

        let Some(record) = self.read_record(ticket_id)? else {
            // A doc without a vector can only come from outside the store
            if self.read_doc(ticket_id)?.is_some() {
                self.storage.delete(
                    CF_TICKETS,
                    &TicketKey::new(&self.project, ticket_id).to_bytes(),
                )?;
            }
            return Ok(false);
        };

        let mut batch = StorageBatch::new();
        batch.delete(
            CF_VECTORS,
            VectorKey::new(&self.project, ticket_id).to_bytes(),
        );
        batch.delete(
            CF_TICKETS,
            TicketKey::new(&self.project, ticket_id).to_bytes(),
        );
        for cascade in &self.cascades {
            cascade.on_delete(&record, &mut batch)?;
        }
        self.storage.write(batch)?;

        debug!(ticket = %ticket_id, "Deleted vector");
        Ok(true)
    }

    /// Fetch a stored vector record.
    pub fn get(&self, ticket_id: &str) -> Result<Option<VectorRecord>, VectorError> {
        let _guard = self.read_fence();
        self.read_record(ticket_id)
    }

    /// Fetch a stored ticket doc.
    pub fn get_doc(&self, ticket_id: &str) -> Result<Option<TicketDoc>, VectorError> {
        let _guard = self.read_fence();
        self.read_doc(ticket_id)
    }

    /// Every ticket doc of the project, in ticket id order.
    pub fn all_docs(&self) -> Result<Vec<TicketDoc>, VectorError> {
        let _guard = self.read_fence();
        let prefix = TicketKey::project_prefix(&self.project);
        self.storage
            .prefix_iterator(CF_TICKETS, &prefix)?
            .into_iter()
            .map(|(_, value)| Ok(serde_json::from_slice(&value)?))
            .collect()
    }

    fn read_record(&self, ticket_id: &str) -> Result<Option<VectorRecord>, VectorError> {
        let key = VectorKey::new(&self.project, ticket_id).to_bytes();
        match self.storage.get(CF_VECTORS, &key)? {
            Some(bytes) => Ok(Some(self.decode_record(&bytes)?)),
            None => Ok(None),
        }
    }

    fn read_doc(&self, ticket_id: &str) -> Result<Option<TicketDoc>, VectorError> {
        let key = TicketKey::new(&self.project, ticket_id).to_bytes();
        match self.storage.get(CF_TICKETS, &key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn decode_record(&self, bytes: &[u8]) -> Result<VectorRecord, VectorError> {
        let record: VectorRecord = serde_json::from_slice(bytes)?;
        if record.model_version == self.model_version && record.values.len() != self.dimension {
            return Err(VectorError::Corrupt(format!(
                "vector for {} has {} values, expected {}",
                record.ticket_id,
                record.values.len(),
                self.dimension
            )));
        }
        Ok(record)
    }

    /// Read one page of records after `after` (exclusive). Caller holds the
    /// fence.
    pub(crate) fn read_page(
        &self,
        after: Option<&[u8]>,
    ) -> Result<Vec<(Vec<u8>, VectorRecord)>, VectorError> {
        let prefix = VectorKey::project_prefix(&self.project);
        self.storage
            .scan_prefix_page(CF_VECTORS, &prefix, after, PAGE_SIZE)?
            .into_iter()
            .map(|(key, value)| Ok((key, self.decode_record(&value)?)))
            .collect()
    }

    /// Up to `k` nearest stored vectors by cosine similarity.
    ///
    /// Results are in descending score order with ties broken by the
    /// smaller ticket id. Ids in `exclude` and vectors from other model
    /// versions are never returned. An empty store yields an empty result.
    #[instrument(skip(self, vector, exclude), fields(project = %self.project))]
    pub fn query_neighbors(
        &self,
        vector: &[f32],
        k: usize,
        exclude: &HashSet<String>,
    ) -> Result<Vec<Neighbor>, VectorError> {
        self.check_dimension(vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let _guard = self.read_fence();
        let mut top = TopK::new(k);
        let mut cursor: Option<Vec<u8>> = None;
        let mut scanned = 0usize;
        let mut skipped_versions = 0usize;

        loop {
            let page = self.read_page(cursor.as_deref())?;
            let Some((last_key, _)) = page.last() else {
                break;
            };
            let next_cursor = last_key.clone();
            let full = page.len() == PAGE_SIZE;

            for (_, record) in page {
                scanned += 1;
                if record.model_version != self.model_version {
                    skipped_versions += 1;
                    continue;
                }
                if exclude.contains(&record.ticket_id) {
                    continue;
                }
                let score = cosine_similarity(vector, &record.values);
                let score = if score.is_finite() {
                    score.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                top.push(Neighbor {
                    ticket_id: record.ticket_id,
                    score,
                });
            }

            if !full {
                break;
            }
            cursor = Some(next_cursor);
        }

        let results = top.into_sorted();
        debug!(
            scanned,
            skipped_versions,
            returned = results.len(),
            "Neighbor query complete"
        );
        Ok(results)
    }

    /// Lazy, page-at-a-time sequence of this project's vectors under the
    /// active model version. Call [`VectorScan::restart`] (or this method
    /// again) to scan from the beginning.
    pub fn all_vectors(&self) -> VectorScan<'_> {
        VectorScan::new(self)
    }

    /// Number of stored vectors, across all model versions.
    pub fn len(&self) -> Result<usize, VectorError> {
        let _guard = self.read_fence();
        Ok(self
            .storage
            .count_prefix(CF_VECTORS, &VectorKey::project_prefix(&self.project))?)
    }

    pub fn is_empty(&self) -> Result<bool, VectorError> {
        Ok(self.len()? == 0)
    }

    /// Ids of vectors stored under a model version other than the active one.
    pub fn stale_ticket_ids(&self) -> Result<Vec<String>, VectorError> {
        let _guard = self.read_fence();
        let mut stale = Vec::new();
        let mut cursor: Option<Vec<u8>> = None;
        loop {
            let page = self.read_page(cursor.as_deref())?;
            let full = page.len() == PAGE_SIZE;
            cursor = page.last().map(|(k, _)| k.clone());
            stale.extend(
                page.into_iter()
                    .filter(|(_, r)| r.model_version != self.model_version)
                    .map(|(_, r)| r.ticket_id),
            );
            if !full {
                break;
            }
        }
        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use triage_storage::column_families::CF_MEMBERSHIPS;

    const VERSION: &str = "test-v1";

    fn create_store(dim: usize) -> (VectorStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        let store = VectorStore::new(storage, "PAY", dim, VERSION).unwrap();
        (store, temp_dir)
    }

    fn unit(values: &[f32]) -> Vec<f32> {
        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        values.iter().map(|v| v / norm).collect()
    }

    fn ids(neighbors: &[Neighbor]) -> Vec<&str> {
        neighbors.iter().map(|n| n.ticket_id.as_str()).collect()
    }

    #[test]
    fn test_self_query_scores_one() {
        let (store, _temp) = create_store(3);
        let v = unit(&[0.2, 0.5, 0.9]);
        store.upsert("PAY-1", v.clone(), VERSION).unwrap();
        store.upsert("PAY-2", unit(&[1.0, 0.0, 0.0]), VERSION).unwrap();

        let hits = store.query_neighbors(&v, 1, &HashSet::new()).unwrap();
        assert_eq!(ids(&hits), vec!["PAY-1"]);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_upsert_is_idempotent_and_replaces() {
        let (store, _temp) = create_store(2);
        let v = unit(&[1.0, 1.0]);
        assert_eq!(
            store.upsert("PAY-1", v.clone(), VERSION).unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            store.upsert("PAY-1", v, VERSION).unwrap(),
            UpsertOutcome::Unchanged
        );
        assert_eq!(
            store.upsert("PAY-1", unit(&[1.0, 0.0]), VERSION).unwrap(),
            UpsertOutcome::Updated
        );
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get("PAY-1").unwrap().unwrap().values, vec![1.0, 0.0]);
    }

    #[test]
    fn test_upsert_ticket_writes_doc() {
        let (store, _temp) = create_store(2);
        let ticket = Ticket::new("PAY-1", "PAY", "Payment timeout").with_labels(["bug"]);
        store.upsert_ticket(&ticket, unit(&[1.0, 0.0])).unwrap();

        let doc = store.get_doc("PAY-1").unwrap().unwrap();
        assert_eq!(doc.title, "Payment timeout");
        assert_eq!(doc.labels, vec!["bug"]);
        assert_eq!(
            store.upsert_ticket(&ticket, unit(&[1.0, 0.0])).unwrap(),
            UpsertOutcome::Unchanged
        );

        let relabeled = ticket.clone().with_labels(["bug", "payments"]);
        assert_eq!(
            store.upsert_ticket(&relabeled, unit(&[1.0, 0.0])).unwrap(),
            UpsertOutcome::Updated
        );
    }

    #[test]
    fn test_upsert_ticket_rejects_other_project() {
        let (store, _temp) = create_store(2);
        let ticket = Ticket::new("WEB-1", "WEB", "Contrast");
        assert!(matches!(
            store.upsert_ticket(&ticket, unit(&[1.0, 0.0])),
            Err(VectorError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let (store, _temp) = create_store(3);
        assert!(matches!(
            store.upsert("PAY-1", vec![1.0, 0.0], VERSION),
            Err(VectorError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        // Checked before looking at the (empty) store
        assert!(matches!(
            store.query_neighbors(&[1.0], 5, &HashSet::new()),
            Err(VectorError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_store_returns_empty() {
        let (store, _temp) = create_store(2);
        let hits = store
            .query_neighbors(&[1.0, 0.0], 5, &HashSet::new())
            .unwrap();
        assert!(hits.is_empty());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_ties_break_by_smaller_id() {
        let (store, _temp) = create_store(2);
        let v = unit(&[1.0, 1.0]);
        for id in ["PAY-9", "PAY-3", "PAY-5"] {
            store.upsert(id, v.clone(), VERSION).unwrap();
        }
        store.upsert("PAY-1", unit(&[1.0, 0.0]), VERSION).unwrap();

        let hits = store.query_neighbors(&v, 3, &HashSet::new()).unwrap();
        assert_eq!(ids(&hits), vec!["PAY-3", "PAY-5", "PAY-9"]);
    }

    #[test]
    fn test_excludes_ids_and_other_versions() {
        let (store, _temp) = create_store(2);
        let v = unit(&[1.0, 0.2]);
        store.upsert("PAY-1", v.clone(), VERSION).unwrap();
        store.upsert("PAY-2", v.clone(), "old-model").unwrap();
        store.upsert("PAY-3", unit(&[1.0, 0.3]), VERSION).unwrap();

        let exclude: HashSet<String> = ["PAY-1".to_string()].into();
        let hits = store.query_neighbors(&v, 10, &exclude).unwrap();
        assert_eq!(ids(&hits), vec!["PAY-3"]);
        assert_eq!(store.stale_ticket_ids().unwrap(), vec!["PAY-2"]);
    }

    #[test]
    fn test_scores_clamped_to_unit_interval() {
        let (store, _temp) = create_store(2);
        store.upsert("PAY-1", vec![-1.0, 0.0], VERSION).unwrap();
        let hits = store
            .query_neighbors(&[1.0, 0.0], 1, &HashSet::new())
            .unwrap();
        assert_eq!(hits[0].score, 0.0);
    }

    #[test]
    fn test_query_spans_pages() {
        let (store, _temp) = create_store(2);
        let total = PAGE_SIZE + 10;
        for i in 0..total {
            let angle = i as f32 / total as f32;
            store
                .upsert(&format!("PAY-{i:04}"), unit(&[1.0, angle]), VERSION)
                .unwrap();
        }
        let hits = store
            .query_neighbors(&unit(&[1.0, 1.0]), 2, &HashSet::new())
            .unwrap();
        // Largest angles are closest to the diagonal
        assert_eq!(
            ids(&hits),
            vec![
                format!("PAY-{:04}", total - 1).as_str(),
                format!("PAY-{:04}", total - 2).as_str()
            ]
        );
    }

    #[test]
    fn test_query_during_upserts_sees_old_or_new_vector() {
        let (store, _temp) = create_store(2);
        let old = vec![1.0, 0.0];
        let new = vec![0.0, 1.0];
        store.upsert("PAY-1", old.clone(), VERSION).unwrap();
        store.upsert("PAY-2", unit(&[1.0, 1.0]), VERSION).unwrap();

        std::thread::scope(|scope| {
            let reader = scope.spawn(|| {
                for _ in 0..500 {
                    let hits = store.query_neighbors(&[1.0, 0.0], 5, &HashSet::new()).unwrap();
                    let pay1 = hits.iter().find(|n| n.ticket_id == "PAY-1").unwrap();
                    assert!(
                        pay1.score == 1.0 || pay1.score == 0.0,
                        "saw a partial vector: {}",
                        pay1.score
                    );
                    assert_eq!(hits.len(), 2);
                }
            });
            for i in 0..500 {
                let values = if i % 2 == 0 { new.clone() } else { old.clone() };
                store.upsert("PAY-1", values, VERSION).unwrap();
            }
            reader.join().unwrap();
        });
    }

    struct RecordingCascade {
        seen: Mutex<Vec<String>>,
    }

    impl DeleteCascade for RecordingCascade {
        fn on_delete(
            &self,
            record: &VectorRecord,
            batch: &mut StorageBatch,
        ) -> Result<(), StorageError> {
            self.seen.lock().unwrap().push(record.ticket_id.clone());
            batch.delete(
                CF_MEMBERSHIPS,
                format!("member:{}:{}", record.project_key, record.ticket_id).into_bytes(),
            );
            Ok(())
        }
    }

    #[test]
    fn test_delete_runs_cascades_atomically() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        storage
            .put(CF_MEMBERSHIPS, b"member:PAY:PAY-1", b"thm")
            .unwrap();
        let cascade = Arc::new(RecordingCascade {
            seen: Mutex::new(Vec::new()),
        });
        let store = VectorStore::new(storage.clone(), "PAY", 2, VERSION)
            .unwrap()
            .with_cascade(cascade.clone());

        let ticket = Ticket::new("PAY-1", "PAY", "Payment timeout");
        store.upsert_ticket(&ticket, unit(&[1.0, 0.0])).unwrap();

        assert!(store.delete("PAY-1").unwrap());
        assert!(store.get("PAY-1").unwrap().is_none());
        assert!(store.get_doc("PAY-1").unwrap().is_none());
        assert!(storage
            .get(CF_MEMBERSHIPS, b"member:PAY:PAY-1")
            .unwrap()
            .is_none());
        assert_eq!(*cascade.seen.lock().unwrap(), vec!["PAY-1"]);

        assert!(!store.delete("PAY-1").unwrap());
    }

    #[test]
    fn test_corrupt_record_is_reported() {
        let (store, _temp) = create_store(2);
        store
            .storage()
            .put(CF_VECTORS, b"vec:PAY:PAY-1", b"not json")
            .unwrap();
        assert!(matches!(
            store.get("PAY-1"),
            Err(VectorError::Corrupt(_))
        ));
    }

    #[test]
    fn test_projects_are_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        let pay = VectorStore::new(storage.clone(), "PAY", 2, VERSION).unwrap();
        let web = VectorStore::new(storage, "WEB", 2, VERSION).unwrap();

        pay.upsert("PAY-1", unit(&[1.0, 0.0]), VERSION).unwrap();
        let hits = web
            .query_neighbors(&[1.0, 0.0], 5, &HashSet::new())
            .unwrap();
        assert!(hits.is_empty());
    }
}
