//! Pipeline error taxonomy
//!
//! Every stage fails the whole batch: there is no per-row partial success.

use thiserror::Error;

use crate::store::StoreError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Required columns absent from the upload
    #[error("Missing columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    /// Unparsable dates, non-numeric values, inverted stays, empty uploads
    #[error("Invalid data: {detail}")]
    DataFormat { detail: String },

    /// Categorical value outside the trained vocabulary
    #[error("Unknown {column} value '{value}': not part of the trained vocabulary")]
    Encoding { column: String, value: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Model artifact missing or incompatible (fatal at startup)
    #[error("Failed to load artifact '{artifact}': {reason}")]
    ArtifactLoad { artifact: String, reason: String },

    /// Classifier output incompatible with the label vocabulary
    #[error("Inference failed: {0}")]
    Inference(String),
}

impl PipelineError {
    pub fn data_format(detail: impl Into<String>) -> Self {
        Self::DataFormat { detail: detail.into() }
    }

    pub fn encoding(column: &str, value: &str) -> Self {
        Self::Encoding {
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    pub fn artifact(artifact: impl Into<String>, reason: impl ToString) -> Self {
        Self::ArtifactLoad {
            artifact: artifact.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors caused by the uploaded file (the uploader can fix and resubmit)
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Schema { .. } | Self::DataFormat { .. } | Self::Encoding { .. }
        )
    }
}
