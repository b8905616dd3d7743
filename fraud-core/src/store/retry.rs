//! Bounded retry for a busy store
//!
//! A busy store is retried a fixed number of times with a fixed delay,
//! then surfaces as `Exhausted`. Other errors surface immediately.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::aggregate::Summary;
use crate::constants::{DEFAULT_STORE_RETRY_ATTEMPTS, DEFAULT_STORE_RETRY_DELAY_MS};
use crate::table::RecordTable;
use super::{BatchId, BatchMeta, OwnerId, ResultStore, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_STORE_RETRY_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_STORE_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Run `op`, retrying while it reports `StoreError::Busy`
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op().await {
            Err(StoreError::Busy(reason)) => {
                if attempt >= max_attempts {
                    log::error!(
                        "Store still busy after {} attempts ({}): {}",
                        attempt, operation, reason
                    );
                    return Err(StoreError::Exhausted {
                        attempts: attempt,
                        last: reason,
                    });
                }
                log::warn!(
                    "Store busy during {}. Retrying {}/{} in {:?}...",
                    operation, attempt, max_attempts, policy.delay
                );
                tokio::time::sleep(policy.delay).await;
            }
            other => return other,
        }
    }
}

// ============================================================================
// RETRYING WRAPPER
// ============================================================================

/// Any store, with every call wrapped in [`with_retry`]
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ResultStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<S: ResultStore> ResultStore for RetryingStore<S> {
    async fn save_batch(
        &self,
        owner_id: OwnerId,
        records: &RecordTable,
        predictions: &RecordTable,
    ) -> StoreResult<BatchMeta> {
        with_retry(&self.policy, "save_batch", move || {
            self.inner.save_batch(owner_id, records, predictions)
        })
        .await
    }

    async fn save_summary(&self, batch_id: BatchId, summary: Summary) -> StoreResult<()> {
        with_retry(&self.policy, "save_summary", move || {
            self.inner.save_summary(batch_id, summary)
        })
        .await
    }

    async fn save_upload(
        &self,
        owner_id: OwnerId,
        records: &RecordTable,
        predictions: &RecordTable,
        summary: Summary,
    ) -> StoreResult<BatchMeta> {
        with_retry(&self.policy, "save_upload", move || {
            self.inner.save_upload(owner_id, records, predictions, summary)
        })
        .await
    }

    async fn list_batches(&self, owner_id: OwnerId) -> StoreResult<Vec<BatchMeta>> {
        with_retry(&self.policy, "list_batches", move || self.inner.list_batches(owner_id)).await
    }

    async fn list_all_batches(&self) -> StoreResult<Vec<BatchMeta>> {
        with_retry(&self.policy, "list_all_batches", move || self.inner.list_all_batches()).await
    }

    async fn get_batch(&self, batch_id: BatchId) -> StoreResult<Option<BatchMeta>> {
        with_retry(&self.policy, "get_batch", move || self.inner.get_batch(batch_id)).await
    }

    async fn get_summary(&self, batch_id: BatchId) -> StoreResult<Option<Summary>> {
        with_retry(&self.policy, "get_summary", move || self.inner.get_summary(batch_id)).await
    }

    async fn get_detail(&self, batch_id: BatchId) -> StoreResult<Option<RecordTable>> {
        with_retry(&self.policy, "get_detail", move || self.inner.get_detail(batch_id)).await
    }

    async fn get_input(&self, batch_id: BatchId) -> StoreResult<Option<RecordTable>> {
        with_retry(&self.policy, "get_input", move || self.inner.get_input(batch_id)).await
    }

    async fn delete_all(&self) -> StoreResult<u64> {
        with_retry(&self.policy, "delete_all", move || self.inner.delete_all()).await
    }
}
