//! NHIS Fraud Detection - Core Pipeline
//!
//! Turns an uploaded table of patient encounters into labeled predictions
//! and per-batch summaries:
//!
//! - `schema` - required columns and date checks
//! - `features` - pinned feature layout and record → vector transform
//! - `model` - frozen artifacts, label vocabulary, classifier adapter
//! - `aggregate` - summaries, national report, fraud drill-down
//! - `store` - persistence contract, retry, legacy count normalization
//! - `pipeline` - the end-to-end upload flow

pub mod aggregate;
pub mod constants;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod table;

#[cfg(test)]
mod test_utils;

pub use aggregate::{LabelCount, NationalReport, Summary};
pub use error::{PipelineError, PipelineResult};
pub use model::{Classifier, ModelArtifacts, ModelInfo, OnnxClassifier, PredictionLabel};
pub use pipeline::{ClassifiedBatch, FraudPipeline, UploadOutcome};
pub use store::{
    BatchId, BatchMeta, InMemoryStore, OwnerId, ResultStore, RetryPolicy, RetryingStore,
    StoreError, StoreResult, StoredCount,
};
pub use table::RecordTable;
