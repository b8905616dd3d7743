//! Model Module - frozen classifier and its training-time artifacts
//!
//! - `artifacts` - scaler, diagnosis vocabulary, fingerprints
//! - `labels` - prediction labels and the label vocabulary
//! - `inference` - classifier trait and ONNX Runtime implementation

pub mod artifacts;
pub mod inference;
pub mod labels;

pub use artifacts::{ArtifactFingerprint, CategoryEncoder, ModelArtifacts, StandardScaler};
pub use inference::{Classifier, ModelInfo, OnnxClassifier};
pub use labels::{LabelDecoder, PredictionLabel};
