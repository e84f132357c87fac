//! Paged iteration over a project's vectors.

use std::collections::VecDeque;

use crate::error::VectorError;
use crate::record::VectorRecord;
use crate::store::{VectorStore, PAGE_SIZE};

/// Lazy sequence of vector records under the store's active model version.
///
/// Holds at most one page in memory. Each page is read under the store's
/// read fence, so a page never contains a half-written record. Records from
/// other model versions are skipped; use
/// [`VectorStore::stale_ticket_ids`] to find them.
pub struct VectorScan<'a> {
    store: &'a VectorStore,
    cursor: Option<Vec<u8>>,
    buffer: VecDeque<VectorRecord>,
    exhausted: bool,
}

impl<'a> VectorScan<'a> {
    pub(crate) fn new(store: &'a VectorStore) -> Self {
        Self {
            store,
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Start over from the first record.
    pub fn restart(&mut self) {
        self.cursor = None;
        self.buffer.clear();
        self.exhausted = false;
    }

    fn fill(&mut self) -> Result<(), VectorError> {
        let page = {
            let _guard = self.store.read_fence();
            self.store.read_page(self.cursor.as_deref())?
        };
        if page.len() < PAGE_SIZE {
            self.exhausted = true;
        }
        if let Some((last, _)) = page.last() {
            self.cursor = Some(last.clone());
        }
        let version = self.store.model_version();
        self.buffer.extend(
            page.into_iter()
                .map(|(_, record)| record)
                .filter(|record| record.model_version == version),
        );
        Ok(())
    }
}

impl Iterator for VectorScan<'_> {
    type Item = Result<VectorRecord, VectorError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Some(Ok(record));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fill() {
                // Stop after reporting; a restart retries from the top
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}
