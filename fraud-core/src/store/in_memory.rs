//! Process-local result store
//!
//! One mutex guards batches and summaries together, so `save_upload` is
//! atomic. Used for development runs and tests.

use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::aggregate::Summary;
use crate::table::RecordTable;
use super::{BatchId, BatchMeta, OwnerId, ResultStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct StoredBatch {
    meta: BatchMeta,
    records: RecordTable,
    predictions: RecordTable,
}

#[derive(Debug, Default)]
struct Inner {
    /// Insertion order doubles as upload order
    batches: Vec<StoredBatch>,
    summaries: HashMap<BatchId, Summary>,
}

impl Inner {
    fn find(&self, batch_id: BatchId) -> Option<&StoredBatch> {
        self.batches.iter().find(|b| b.meta.batch_id == batch_id)
    }

    fn insert_batch(&mut self, owner_id: OwnerId, records: &RecordTable, predictions: &RecordTable) -> BatchMeta {
        let meta = BatchMeta {
            batch_id: Uuid::new_v4(),
            owner_id,
            uploaded_at: Utc::now(),
            row_count: predictions.len() as i64,
        };
        self.batches.push(StoredBatch {
            meta: meta.clone(),
            records: records.clone(),
            predictions: predictions.clone(),
        });
        meta
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    #[cfg(test)]
    busy_failures: AtomicU32,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls fail with `StoreError::Busy`
    #[cfg(test)]
    pub fn simulate_busy(&self, n: u32) {
        self.busy_failures.store(n, Ordering::SeqCst);
    }

    pub fn batch_count(&self) -> usize {
        self.inner.lock().batches.len()
    }

    pub fn summary_count(&self) -> usize {
        self.inner.lock().summaries.len()
    }

    #[cfg(test)]
    fn check_busy(&self) -> StoreResult<()> {
        let was_busy = self
            .busy_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if was_busy {
            return Err(StoreError::Busy("store is locked".to_string()));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_busy(&self) -> StoreResult<()> {
        Ok(())
    }

    fn newest_first<'a, I>(batches: I) -> Vec<BatchMeta>
    where
        I: DoubleEndedIterator<Item = &'a StoredBatch>,
    {
        batches.rev().map(|b| b.meta.clone()).collect()
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    async fn save_batch(
        &self,
        owner_id: OwnerId,
        records: &RecordTable,
        predictions: &RecordTable,
    ) -> StoreResult<BatchMeta> {
        self.check_busy()?;
        Ok(self.inner.lock().insert_batch(owner_id, records, predictions))
    }

    async fn save_summary(&self, batch_id: BatchId, summary: Summary) -> StoreResult<()> {
        self.check_busy()?;
        let mut inner = self.inner.lock();
        if inner.find(batch_id).is_none() {
            return Err(StoreError::NotFound(batch_id));
        }
        inner.summaries.insert(batch_id, summary);
        Ok(())
    }

    async fn save_upload(
        &self,
        owner_id: OwnerId,
        records: &RecordTable,
        predictions: &RecordTable,
        summary: Summary,
    ) -> StoreResult<BatchMeta> {
        self.check_busy()?;
        let mut inner = self.inner.lock();
        let meta = inner.insert_batch(owner_id, records, predictions);
        inner.summaries.insert(meta.batch_id, summary);
        Ok(meta)
    }

    async fn list_batches(&self, owner_id: OwnerId) -> StoreResult<Vec<BatchMeta>> {
        self.check_busy()?;
        let inner = self.inner.lock();
        let owned: Vec<&StoredBatch> = inner
            .batches
            .iter()
            .filter(|b| b.meta.owner_id == owner_id)
            .collect();
        Ok(Self::newest_first(owned.into_iter()))
    }

    async fn list_all_batches(&self) -> StoreResult<Vec<BatchMeta>> {
        self.check_busy()?;
        Ok(Self::newest_first(self.inner.lock().batches.iter()))
    }

    async fn get_batch(&self, batch_id: BatchId) -> StoreResult<Option<BatchMeta>> {
        self.check_busy()?;
        Ok(self.inner.lock().find(batch_id).map(|b| b.meta.clone()))
    }

    async fn get_summary(&self, batch_id: BatchId) -> StoreResult<Option<Summary>> {
        self.check_busy()?;
        Ok(self.inner.lock().summaries.get(&batch_id).copied())
    }

    async fn get_detail(&self, batch_id: BatchId) -> StoreResult<Option<RecordTable>> {
        self.check_busy()?;
        Ok(self.inner.lock().find(batch_id).map(|b| b.predictions.clone()))
    }

    async fn get_input(&self, batch_id: BatchId) -> StoreResult<Option<RecordTable>> {
        self.check_busy()?;
        Ok(self.inner.lock().find(batch_id).map(|b| b.records.clone()))
    }

    async fn delete_all(&self) -> StoreResult<u64> {
        self.check_busy()?;
        let mut inner = self.inner.lock();
        let removed = inner.batches.len() as u64;
        inner.batches.clear();
        inner.summaries.clear();
        Ok(removed)
    }
}
