//! Shared fixtures for unit tests

use crate::error::{PipelineError, PipelineResult};
use crate::features::layout::IDX_DIAGNOSIS;
use crate::features::vector::FeatureMatrix;
use crate::model::artifacts::{CategoryEncoder, ModelArtifacts, StandardScaler};
use crate::model::inference::Classifier;
use crate::model::labels::LabelDecoder;
use crate::table::RecordTable;

pub const HEADER: &str = "Patient ID,Date Admitted,Date Discharged,Age,Gender,Diagnosis,Amount Billed";

/// Label vocabulary: 0 = Billing Fraud, 1 = No Fraud, 2 = Phantom Billing
pub fn sample_artifacts() -> ModelArtifacts {
    let scaler = StandardScaler::new(vec![40.0, 1000.0, 3.0], vec![10.0, 500.0, 2.0]).unwrap();
    let diagnosis = CategoryEncoder::new(
        "diagnosis",
        vec!["Asthma".into(), "Diabetes".into(), "Malaria".into()],
    )
    .unwrap();
    let labels = LabelDecoder::from_classes(vec![
        "Billing Fraud".into(),
        "No Fraud".into(),
        "Phantom Billing".into(),
    ])
    .unwrap();
    ModelArtifacts::new(scaler, diagnosis, labels)
}

pub fn csv_table(body: &str) -> RecordTable {
    RecordTable::from_csv_bytes(format!("{}\n{}", HEADER, body).as_bytes()).unwrap()
}

/// Predicts from the diagnosis code: Asthma → No Fraud, Diabetes → Billing
/// Fraud, Malaria → Phantom Billing. Deterministic, like a frozen model.
pub struct DiagnosisClassifier;

impl Classifier for DiagnosisClassifier {
    fn predict(&self, features: &FeatureMatrix) -> PipelineResult<Vec<i64>> {
        Ok(features
            .rows()
            .iter()
            .map(|row| match row.values[IDX_DIAGNOSIS] as i64 {
                0 => 1,
                1 => 0,
                _ => 2,
            })
            .collect())
    }

    fn name(&self) -> String {
        "diagnosis-fake".to_string()
    }
}

/// Always returns a fixed list, regardless of input
pub struct FixedClassifier(pub Vec<i64>);

impl Classifier for FixedClassifier {
    fn predict(&self, _features: &FeatureMatrix) -> PipelineResult<Vec<i64>> {
        Ok(self.0.clone())
    }

    fn name(&self) -> String {
        "fixed-fake".to_string()
    }
}

pub struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn predict(&self, _features: &FeatureMatrix) -> PipelineResult<Vec<i64>> {
        Err(PipelineError::Inference("model crashed".to_string()))
    }

    fn name(&self) -> String {
        "failing-fake".to_string()
    }
}
