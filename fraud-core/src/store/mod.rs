//! Result Store - persistence contract for batches
//!
//! - `legacy` - normalization of counts written by older schemas
//! - `retry` - bounded retry on a busy store
//! - `in_memory` - process-local implementation
//!
//! The PostgreSQL implementation lives with the server.

pub mod in_memory;
pub mod legacy;
pub mod retry;


use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::aggregate::Summary;
use crate::table::RecordTable;

pub use in_memory::InMemoryStore;
pub use legacy::StoredCount;
pub use retry::{with_retry, RetryPolicy, RetryingStore};

pub type BatchId = Uuid;
pub type OwnerId = Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transient contention (locked rows, serialization failure); retryable
    #[error("store busy: {0}")]
    Busy(String),

    #[error("store still busy after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("batch {0} not found")]
    NotFound(BatchId),

    /// Anything not worth retrying
    #[error("{0}")]
    Permanent(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }
}

/// Listing entry for a stored batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMeta {
    pub batch_id: BatchId,
    pub owner_id: OwnerId,
    pub uploaded_at: DateTime<Utc>,
    pub row_count: i64,
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persist input and prediction tables under a new batch id
    async fn save_batch(
        &self,
        owner_id: OwnerId,
        records: &RecordTable,
        predictions: &RecordTable,
    ) -> StoreResult<BatchMeta>;

    /// Persist (or replace) the summary of an existing batch
    async fn save_summary(&self, batch_id: BatchId, summary: Summary) -> StoreResult<()>;

    /// `save_batch` + `save_summary` as one unit: both visible, or neither
    async fn save_upload(
        &self,
        owner_id: OwnerId,
        records: &RecordTable,
        predictions: &RecordTable,
        summary: Summary,
    ) -> StoreResult<BatchMeta>;

    /// Batches of one owner, newest first
    async fn list_batches(&self, owner_id: OwnerId) -> StoreResult<Vec<BatchMeta>>;

    /// Batches of every owner, newest first
    async fn list_all_batches(&self) -> StoreResult<Vec<BatchMeta>>;

    async fn get_batch(&self, batch_id: BatchId) -> StoreResult<Option<BatchMeta>>;

    async fn get_summary(&self, batch_id: BatchId) -> StoreResult<Option<Summary>>;

    /// Prediction table (input rows + `Prediction` column)
    async fn get_detail(&self, batch_id: BatchId) -> StoreResult<Option<RecordTable>>;

    /// Input table exactly as uploaded
    async fn get_input(&self, batch_id: BatchId) -> StoreResult<Option<RecordTable>>;

    /// Remove every batch and summary; returns the number of batches removed
    async fn delete_all(&self) -> StoreResult<u64>;
}
