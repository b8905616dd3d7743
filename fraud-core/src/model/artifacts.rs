//! Frozen training-time artifacts
//!
//! Scaler parameters and categorical vocabularies are fit once during
//! training and shipped next to the model. They are loaded at startup,
//! validated for shape, and never mutated afterwards.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{
    DIAGNOSIS_ENCODER_FILE, LABEL_ENCODER_FILE, NO_FRAUD_LABEL, SCALED_COLUMNS, SCALER_FILE,
};
use crate::error::{PipelineError, PipelineResult};
use super::labels::LabelDecoder;

// ============================================================================
// STANDARD SCALER
// ============================================================================

/// On-disk scaler format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerFile {
    pub columns: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Per-column (mean, scale) pairs in `SCALED_COLUMNS` order
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Build from parameters given in `SCALED_COLUMNS` order
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> PipelineResult<Self> {
        let columns = SCALED_COLUMNS.iter().map(|c| c.to_string()).collect();
        Self::from_file(ScalerFile { columns, mean, scale })
    }

    pub fn from_file(file: ScalerFile) -> PipelineResult<Self> {
        if file.columns != SCALED_COLUMNS {
            return Err(PipelineError::artifact(
                SCALER_FILE,
                format!("expected columns {:?}, found {:?}", SCALED_COLUMNS, file.columns),
            ));
        }
        if file.mean.len() != SCALED_COLUMNS.len() || file.scale.len() != SCALED_COLUMNS.len() {
            return Err(PipelineError::artifact(
                SCALER_FILE,
                format!(
                    "expected {} means and scales, found {} and {}",
                    SCALED_COLUMNS.len(),
                    file.mean.len(),
                    file.scale.len()
                ),
            ));
        }
        if file.mean.iter().any(|m| !m.is_finite()) {
            return Err(PipelineError::artifact(SCALER_FILE, "non-finite mean"));
        }
        if file.scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(PipelineError::artifact(SCALER_FILE, "scale must be finite and non-zero"));
        }

        Ok(Self {
            mean: file.mean,
            scale: file.scale,
        })
    }

    /// Standardize `values` given in `SCALED_COLUMNS` order
    pub fn transform(&self, values: [f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for (i, value) in values.iter().enumerate() {
            out[i] = (value - self.mean[i]) / self.scale[i];
        }
        out
    }
}

// ============================================================================
// CATEGORY ENCODER
// ============================================================================

/// On-disk encoder format: class at position `i` encodes to `i`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderFile {
    pub classes: Vec<String>,
}

/// Fixed categorical vocabulary
#[derive(Debug, Clone)]
pub struct CategoryEncoder {
    classes: Vec<String>,
    index: HashMap<String, usize>,
}

impl CategoryEncoder {
    /// `artifact` names the source in error messages
    pub fn new(artifact: &str, classes: Vec<String>) -> PipelineResult<Self> {
        if classes.is_empty() {
            return Err(PipelineError::artifact(artifact, "vocabulary is empty"));
        }

        let mut index = HashMap::with_capacity(classes.len());
        for (i, class) in classes.iter().enumerate() {
            if index.insert(class.clone(), i).is_some() {
                return Err(PipelineError::artifact(
                    artifact,
                    format!("duplicate class '{}'", class),
                ));
            }
        }

        Ok(Self { classes, index })
    }

    pub fn encode(&self, value: &str) -> Option<usize> {
        self.index.get(value).copied()
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

// ============================================================================
// FINGERPRINTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFingerprint {
    pub file: String,
    pub sha256: String,
}

impl ArtifactFingerprint {
    pub fn of_bytes(file: &str, bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            file: file.to_string(),
            sha256: hex::encode(hasher.finalize()),
        }
    }
}

/// Read an artifact file, failing with `ArtifactLoad` when absent
pub(crate) fn read_artifact(dir: &Path, file: &str) -> PipelineResult<(Vec<u8>, ArtifactFingerprint)> {
    let path = dir.join(file);
    if !path.exists() {
        return Err(PipelineError::artifact(
            file,
            format!("not found at {}", path.display()),
        ));
    }

    let bytes = fs::read(&path).map_err(|e| PipelineError::artifact(file, e))?;
    let fingerprint = ArtifactFingerprint::of_bytes(file, &bytes);
    Ok((bytes, fingerprint))
}

fn parse_json<T: serde::de::DeserializeOwned>(file: &str, bytes: &[u8]) -> PipelineResult<T> {
    serde_json::from_slice(bytes).map_err(|e| PipelineError::artifact(file, e))
}

// ============================================================================
// ARTIFACT BUNDLE
// ============================================================================

/// Preprocessing artifacts shared by every upload
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub scaler: StandardScaler,
    pub diagnosis: CategoryEncoder,
    pub labels: LabelDecoder,
    pub fingerprints: Vec<ArtifactFingerprint>,
}

impl ModelArtifacts {
    pub fn new(scaler: StandardScaler, diagnosis: CategoryEncoder, labels: LabelDecoder) -> Self {
        Self {
            scaler,
            diagnosis,
            labels,
            fingerprints: Vec::new(),
        }
    }

    /// Load scaler and encoders from `dir`
    pub fn load(dir: &Path) -> PipelineResult<Self> {
        let (scaler_bytes, scaler_fp) = read_artifact(dir, SCALER_FILE)?;
        let scaler = StandardScaler::from_file(parse_json(SCALER_FILE, &scaler_bytes)?)?;

        let (diag_bytes, diag_fp) = read_artifact(dir, DIAGNOSIS_ENCODER_FILE)?;
        let diag_file: EncoderFile = parse_json(DIAGNOSIS_ENCODER_FILE, &diag_bytes)?;
        let diagnosis = CategoryEncoder::new(DIAGNOSIS_ENCODER_FILE, diag_file.classes)?;

        let (label_bytes, label_fp) = read_artifact(dir, LABEL_ENCODER_FILE)?;
        let label_file: EncoderFile = parse_json(LABEL_ENCODER_FILE, &label_bytes)?;
        let labels = LabelDecoder::new(CategoryEncoder::new(LABEL_ENCODER_FILE, label_file.classes)?)?;

        log::info!(
            "Loaded preprocessing artifacts: {} diagnoses, {} labels ('{}' is non-fraud)",
            diagnosis.len(),
            labels.len(),
            NO_FRAUD_LABEL
        );

        Ok(Self {
            scaler,
            diagnosis,
            labels,
            fingerprints: vec![scaler_fp, diag_fp, label_fp],
        })
    }
}
