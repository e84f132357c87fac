//! RocksDB wrapper for backlog-triage storage.
//!
//! Provides:
//! - Database open/close with column family setup
//! - Atomic multi-column-family write batches
//! - Single-key reads, full prefix reads and paged prefix scans

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use tracing::{debug, info};

use crate::column_families::{
    build_cf_descriptors, ALL_CF_NAMES, CF_MEMBERSHIPS, CF_THEMES, CF_TICKETS, CF_VECTORS,
};
use crate::error::StorageError;

/// A pending write, resolved against column family handles on commit.
#[derive(Debug, Clone)]
enum BatchOp {
    Put {
        cf: &'static str,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        cf: &'static str,
        key: Vec<u8>,
    },
}

/// A set of writes committed atomically by [`Storage::write`].
///
/// Either every operation becomes visible or none does, so readers never
/// observe a vector without its doc or a theme without its memberships.
#[derive(Debug, Default, Clone)]
pub struct StorageBatch {
    ops: Vec<BatchOp>,
}

impl StorageBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, cf: &'static str, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put { cf, key, value });
    }

    pub fn delete(&mut self, cf: &'static str, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete { cf, key });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Main storage interface for backlog-triage
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(4);

        let cf_descriptors = build_cf_descriptors();
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        Ok(Self { db })
    }

    fn cf(&self, cf_name: &str) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(cf_name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(cf_name.to_string()))
    }

    /// Put a value into a specific column family.
    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(cf, key, value)?;
        Ok(())
    }

    /// Get a value from a specific column family.
    pub fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self.cf(cf_name)?;
        let result = self.db.get_cf(cf, key)?;
        Ok(result)
    }

    /// Delete a value from a specific column family.
    pub fn delete(&self, cf_name: &str, key: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf(cf_name)?;
        self.db.delete_cf(cf, key)?;
        Ok(())
    }

    /// Commit a batch of writes atomically.
    pub fn write(&self, batch: StorageBatch) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }
        let count = batch.len();
        let mut wb = WriteBatch::default();
        for op in batch.ops {
            match op {
                BatchOp::Put { cf, key, value } => wb.put_cf(self.cf(cf)?, key, value),
                BatchOp::Delete { cf, key } => wb.delete_cf(self.cf(cf)?, key),
            }
        }
        self.db.write(wb)?;
        debug!(ops = count, "Committed write batch");
        Ok(())
    }

    /// Iterate over entries with a given prefix in a column family.
    ///
    /// Returns every (key, value) pair; use [`Storage::scan_prefix_page`]
    /// when the prefix may cover many records.
    #[allow(clippy::type_complexity)]
    pub fn prefix_iterator(
        &self,
        cf_name: &str,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        self.scan_prefix_page(cf_name, prefix, None, usize::MAX)
    }

    /// Read up to `limit` entries under `prefix`, starting strictly after
    /// the key `after` (or at the start of the prefix).
    ///
    /// Passing the last key of one page as `after` yields the next page, so
    /// callers can resume a scan without holding an iterator open.
    #[allow(clippy::type_complexity)]
    pub fn scan_prefix_page(
        &self,
        cf_name: &str,
        prefix: &[u8],
        after: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let cf = self.cf(cf_name)?;
        let start = after.unwrap_or(prefix);

        let mut results = Vec::new();
        if limit == 0 {
            return Ok(results);
        }
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(start, Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            // Stop if we've passed the prefix
            if !key.starts_with(prefix) {
                break;
            }
            if after.is_some_and(|a| key.as_ref() == a) {
                continue;
            }
            results.push((key.to_vec(), value.to_vec()));
            if results.len() >= limit {
                break;
            }
        }

        Ok(results)
    }

    /// Count entries under a prefix without materializing values.
    pub fn count_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<usize, StorageError> {
        let cf = self.cf(cf_name)?;
        let mut count = 0;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    /// Flush all column families to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(cf)?;
            }
        }
        Ok(())
    }

    /// Get database statistics.
    pub fn get_stats(&self) -> Result<StorageStats, StorageError> {
        Ok(StorageStats {
            vector_count: self.count_prefix(CF_VECTORS, b"")?,
            ticket_count: self.count_prefix(CF_TICKETS, b"")?,
            theme_count: self.count_prefix(CF_THEMES, b"")?,
            membership_count: self.count_prefix(CF_MEMBERSHIPS, b"")?,
        })
    }
}

/// Record counts across all projects.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StorageStats {
    pub vector_count: usize,
    pub ticket_count: usize,
    pub theme_count: usize,
    pub membership_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path()).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_open_creates_column_families() {
        let (storage, _temp) = create_test_storage();
        for cf_name in ALL_CF_NAMES {
            assert!(
                storage.db.cf_handle(cf_name).is_some(),
                "CF {} should exist",
                cf_name
            );
        }
    }

    #[test]
    fn test_put_get_delete() {
        let (storage, _temp) = create_test_storage();
        storage.put(CF_VECTORS, b"vec:P:1", b"one").unwrap();
        assert_eq!(
            storage.get(CF_VECTORS, b"vec:P:1").unwrap(),
            Some(b"one".to_vec())
        );
        storage.delete(CF_VECTORS, b"vec:P:1").unwrap();
        assert_eq!(storage.get(CF_VECTORS, b"vec:P:1").unwrap(), None);
    }

    #[test]
    fn test_unknown_column_family() {
        let (storage, _temp) = create_test_storage();
        let err = storage.get("nope", b"k").unwrap_err();
        assert!(matches!(err, StorageError::ColumnFamilyNotFound(_)));
    }

    #[test]
    fn test_batch_spans_column_families() {
        let (storage, _temp) = create_test_storage();
        storage.put(CF_MEMBERSHIPS, b"member:P:1", b"old").unwrap();

        let mut batch = StorageBatch::new();
        batch.put(CF_VECTORS, b"vec:P:1".to_vec(), b"v".to_vec());
        batch.put(CF_TICKETS, b"tkt:P:1".to_vec(), b"t".to_vec());
        batch.delete(CF_MEMBERSHIPS, b"member:P:1".to_vec());
        assert_eq!(batch.len(), 3);
        storage.write(batch).unwrap();

        assert!(storage.get(CF_VECTORS, b"vec:P:1").unwrap().is_some());
        assert!(storage.get(CF_TICKETS, b"tkt:P:1").unwrap().is_some());
        assert!(storage.get(CF_MEMBERSHIPS, b"member:P:1").unwrap().is_none());
    }

    #[test]
    fn test_prefix_iterator_stays_in_project() {
        let (storage, _temp) = create_test_storage();
        storage.put(CF_VECTORS, b"vec:A:1", b"a1").unwrap();
        storage.put(CF_VECTORS, b"vec:A:2", b"a2").unwrap();
        storage.put(CF_VECTORS, b"vec:AB:1", b"ab1").unwrap();
        storage.put(CF_VECTORS, b"vec:B:1", b"b1").unwrap();

        let entries = storage.prefix_iterator(CF_VECTORS, b"vec:A:").unwrap();
        let values: Vec<_> = entries.into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![b"a1".to_vec(), b"a2".to_vec()]);
    }

    #[test]
    fn test_scan_prefix_page_resumes_after_key() {
        let (storage, _temp) = create_test_storage();
        for i in 0..5 {
            let key = format!("vec:P:{i}");
            storage.put(CF_VECTORS, key.as_bytes(), b"x").unwrap();
        }

        let first = storage
            .scan_prefix_page(CF_VECTORS, b"vec:P:", None, 2)
            .unwrap();
        assert_eq!(first.len(), 2);
        let last = first.last().map(|(k, _)| k.clone()).unwrap();

        let second = storage
            .scan_prefix_page(CF_VECTORS, b"vec:P:", Some(&last), 2)
            .unwrap();
        let keys: Vec<_> = second
            .iter()
            .map(|(k, _)| String::from_utf8(k.clone()).unwrap())
            .collect();
        assert_eq!(keys, vec!["vec:P:2", "vec:P:3"]);

        let rest = storage
            .scan_prefix_page(CF_VECTORS, b"vec:P:", Some(b"vec:P:3"), 10)
            .unwrap();
        assert_eq!(rest.len(), 1);
    }

    #[test]
    fn test_stats_and_count_prefix() {
        let (storage, _temp) = create_test_storage();
        storage.put(CF_VECTORS, b"vec:A:1", b"x").unwrap();
        storage.put(CF_VECTORS, b"vec:B:1", b"x").unwrap();
        storage.put(CF_THEMES, b"theme:A:t", b"x").unwrap();

        assert_eq!(storage.count_prefix(CF_VECTORS, b"vec:A:").unwrap(), 1);
        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.vector_count, 2);
        assert_eq!(stats.theme_count, 1);
        assert_eq!(stats.ticket_count, 0);
    }

    #[test]
    fn test_reopen_is_durable() {
        let temp_dir = TempDir::new().unwrap();
        {
            let storage = Storage::open(temp_dir.path()).unwrap();
            storage.put(CF_TICKETS, b"tkt:P:1", b"doc").unwrap();
            storage.flush().unwrap();
        }
        let storage = Storage::open(temp_dir.path()).unwrap();
        assert_eq!(
            storage.get(CF_TICKETS, b"tkt:P:1").unwrap(),
            Some(b"doc".to_vec())
        );
    }
}
