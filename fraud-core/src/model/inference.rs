//! Inference Engine - ONNX Runtime Integration
//!
//! The classifier is loaded once at startup and injected into the pipeline.
//! Anything implementing [`Classifier`] can stand in for it (tests use a
//! deterministic fake).

use std::path::Path;

use chrono::{DateTime, Utc};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::constants::MODEL_FILE;
use crate::error::{PipelineError, PipelineResult};
use crate::features::layout::{LayoutInfo, FEATURE_COUNT};
use crate::features::vector::{FeatureMatrix, FeatureVector};
use super::artifacts::{read_artifact, ArtifactFingerprint};

/// Preferred output of converted tree-ensemble classifiers
const LABEL_OUTPUT: &str = "label";

// ============================================================================
// CLASSIFIER TRAIT
// ============================================================================

/// A frozen classifier: one encoded label per feature row
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &FeatureMatrix) -> PipelineResult<Vec<i64>>;

    /// Short identifier for logs and the model info endpoint
    fn name(&self) -> String;

    fn fingerprint(&self) -> Option<ArtifactFingerprint> {
        None
    }
}

/// Model description exposed to operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_name: String,
    pub layout: LayoutInfo,
    pub labels: Vec<String>,
    pub diagnosis_vocabulary_size: usize,
    pub fingerprints: Vec<ArtifactFingerprint>,
    pub loaded_at: DateTime<Utc>,
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

pub struct OnnxClassifier {
    session: Mutex<Session>,
    output_name: String,
    model_path: String,
    fingerprint: ArtifactFingerprint,
}

impl OnnxClassifier {
    /// Load `fraud_detection_model.onnx` from the model directory
    pub fn load(dir: &Path) -> PipelineResult<Self> {
        let (bytes, fingerprint) = read_artifact(dir, MODEL_FILE)?;
        let model_path = dir.join(MODEL_FILE).display().to_string();

        log::info!("Loading ONNX model from: {}", model_path);

        let session = Session::builder()
            .map_err(|e| PipelineError::artifact(MODEL_FILE, format!("session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| PipelineError::artifact(MODEL_FILE, format!("optimization: {}", e)))?
            .commit_from_memory(&bytes)
            .map_err(|e| PipelineError::artifact(MODEL_FILE, e))?;

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name == LABEL_OUTPUT)
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .ok_or_else(|| PipelineError::artifact(MODEL_FILE, "model defines no outputs"))?;

        let classifier = Self {
            session: Mutex::new(session),
            output_name,
            model_path,
            fingerprint,
        };

        // A single dry run proves the model accepts our feature width
        let smoke_row = FeatureMatrix::new(vec![FeatureVector::from_values([0.0; FEATURE_COUNT])]);
        classifier.predict(&smoke_row).map_err(|e| {
            PipelineError::artifact(
                MODEL_FILE,
                format!("model rejects a {}-feature row: {}", FEATURE_COUNT, e),
            )
        })?;

        log::info!(
            "ONNX model loaded successfully (output '{}', sha256 {})",
            classifier.output_name,
            classifier.fingerprint.sha256
        );

        Ok(classifier)
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, features: &FeatureMatrix) -> PipelineResult<Vec<i64>> {
        if features.is_empty() {
            return Ok(Vec::new());
        }

        let start_time = std::time::Instant::now();

        let input_tensor = Value::from_array(features.to_array())
            .map_err(|e| PipelineError::Inference(format!("tensor error: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| PipelineError::Inference(format!("inference failed: {}", e)))?;

        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| PipelineError::Inference(format!("no output '{}'", self.output_name)))?;

        let (_, labels) = output
            .try_extract_tensor::<i64>()
            .map_err(|e| PipelineError::Inference(format!("extract error: {}", e)))?;

        log::debug!(
            "Classified {} rows in {}us",
            features.len(),
            start_time.elapsed().as_micros()
        );

        Ok(labels.to_vec())
    }

    fn name(&self) -> String {
        format!("onnx:{}", self.model_path)
    }

    fn fingerprint(&self) -> Option<ArtifactFingerprint> {
        Some(self.fingerprint.clone())
    }
}
