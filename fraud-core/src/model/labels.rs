//! Prediction labels and the frozen label vocabulary

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{LABEL_ENCODER_FILE, NO_FRAUD_LABEL};
use crate::error::{PipelineError, PipelineResult};
use super::artifacts::CategoryEncoder;

/// Decoded classifier outcome
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionLabel(String);

impl PredictionLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn no_fraud() -> Self {
        Self(NO_FRAUD_LABEL.to_string())
    }

    /// Everything except "No Fraud" counts as fraud
    pub fn is_fraud(&self) -> bool {
        self.0 != NO_FRAUD_LABEL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PredictionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PredictionLabel {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Maps model class indices back to human-readable labels
#[derive(Debug, Clone)]
pub struct LabelDecoder {
    vocabulary: CategoryEncoder,
}

impl LabelDecoder {
    /// The vocabulary must contain the non-fraud label
    pub fn new(vocabulary: CategoryEncoder) -> PipelineResult<Self> {
        if vocabulary.encode(NO_FRAUD_LABEL).is_none() {
            return Err(PipelineError::artifact(
                LABEL_ENCODER_FILE,
                format!("label vocabulary has no '{}' class", NO_FRAUD_LABEL),
            ));
        }
        Ok(Self { vocabulary })
    }

    pub fn from_classes(classes: Vec<String>) -> PipelineResult<Self> {
        Self::new(CategoryEncoder::new(LABEL_ENCODER_FILE, classes)?)
    }

    pub fn decode(&self, code: i64) -> PipelineResult<PredictionLabel> {
        usize::try_from(code)
            .ok()
            .and_then(|c| self.vocabulary.decode(c))
            .map(PredictionLabel::new)
            .ok_or_else(|| {
                PipelineError::Inference(format!(
                    "classifier produced class {} but the label vocabulary has {} classes",
                    code,
                    self.vocabulary.len()
                ))
            })
    }

    pub fn decode_all(&self, codes: &[i64]) -> PipelineResult<Vec<PredictionLabel>> {
        codes.iter().map(|&c| self.decode(c)).collect()
    }

    pub fn classes(&self) -> &[String] {
        self.vocabulary.classes()
    }

    pub fn len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> LabelDecoder {
        LabelDecoder::from_classes(vec![
            "Billing Fraud".to_string(),
            "No Fraud".to_string(),
            "Upcoding".to_string(),
        ])
        .unwrap()
    }

    #[test]
    fn test_decode_known_codes() {
        let labels = decoder().decode_all(&[1, 0, 2]).unwrap();
        assert_eq!(labels[0], PredictionLabel::no_fraud());
        assert_eq!(labels[1].as_str(), "Billing Fraud");
        assert!(labels[2].is_fraud());
        assert!(!labels[0].is_fraud());
    }

    #[test]
    fn test_out_of_range_code_is_inference_error() {
        assert!(matches!(decoder().decode(3), Err(PipelineError::Inference(_))));
        assert!(matches!(decoder().decode(-1), Err(PipelineError::Inference(_))));
    }

    #[test]
    fn test_vocabulary_without_no_fraud_rejected() {
        let result = LabelDecoder::from_classes(vec!["Billing Fraud".to_string()]);
        assert!(matches!(result, Err(PipelineError::ArtifactLoad { .. })));
    }
}
