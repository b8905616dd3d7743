//! Upload pipeline: validate → transform → classify → aggregate → persist
//!
//! One upload is processed end-to-end inside the caller's request. Any
//! failure rejects the whole batch and nothing is written.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::Summary;
use crate::constants::COL_PREDICTION;
use crate::error::{PipelineError, PipelineResult};
use crate::features::{FeatureTransformer, LayoutInfo};
use crate::model::{Classifier, ModelArtifacts, ModelInfo, OnnxClassifier, PredictionLabel};
use crate::schema::validate;
use crate::store::{BatchId, BatchMeta, OwnerId, ResultStore};
use crate::table::RecordTable;

/// Labeled output of one upload, before persistence
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedBatch {
    /// Input rows with the `Prediction` column set (appended, or overwritten
    /// when the upload already carried one)
    pub predictions: RecordTable,
    pub labels: Vec<PredictionLabel>,
    pub summary: Summary,
}

/// Outcome of a persisted upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub batch_id: BatchId,
    pub summary: Summary,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadOutcome {
    fn new(meta: &BatchMeta, summary: Summary) -> Self {
        Self {
            batch_id: meta.batch_id,
            summary,
            uploaded_at: meta.uploaded_at,
        }
    }
}

pub struct FraudPipeline {
    artifacts: ModelArtifacts,
    classifier: Arc<dyn Classifier>,
    loaded_at: DateTime<Utc>,
}

impl FraudPipeline {
    pub fn new(artifacts: ModelArtifacts, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            artifacts,
            classifier,
            loaded_at: Utc::now(),
        }
    }

    /// Load every artifact and the ONNX model from `dir`.
    ///
    /// Any missing or malformed artifact is an `ArtifactLoad` error.
    pub fn from_model_dir(dir: &Path) -> PipelineResult<Self> {
        let artifacts = ModelArtifacts::load(dir)?;
        let classifier = OnnxClassifier::load(dir)?;
        Ok(Self::new(artifacts, Arc::new(classifier)))
    }

    pub fn artifacts(&self) -> &ModelArtifacts {
        &self.artifacts
    }

    /// Label every row of `table` without persisting anything
    pub fn classify(&self, table: &RecordTable) -> PipelineResult<ClassifiedBatch> {
        let batch = validate(table)?;

        let transformer = FeatureTransformer::new(&self.artifacts.scaler, &self.artifacts.diagnosis);
        let features = transformer.transform(&batch)?;
        features
            .validate()
            .map_err(|e| PipelineError::Inference(e.to_string()))?;

        let codes = self.classifier.predict(&features)?;
        if codes.len() != batch.len() {
            return Err(PipelineError::Inference(format!(
                "classifier returned {} predictions for {} rows",
                codes.len(),
                batch.len()
            )));
        }

        let labels = self.artifacts.labels.decode_all(&codes)?;
        let predictions = table.with_column(
            COL_PREDICTION,
            labels.iter().map(|l| l.as_str().to_string()).collect(),
        )?;
        let summary = Summary::from_labels(&labels);

        Ok(ClassifiedBatch {
            predictions,
            labels,
            summary,
        })
    }

    /// Classify an upload and persist tables and summary in one store call
    pub async fn process_upload(
        &self,
        owner_id: OwnerId,
        table: &RecordTable,
        store: &dyn ResultStore,
    ) -> PipelineResult<UploadOutcome> {
        let classified = match self.classify(table) {
            Ok(classified) => classified,
            Err(e) => {
                log::warn!("Upload from {} rejected: {}", owner_id, e);
                return Err(e);
            }
        };

        let meta = store
            .save_upload(owner_id, table, &classified.predictions, classified.summary)
            .await?;

        log::info!(
            "Batch {} stored for {}: {} cases, {} flagged",
            meta.batch_id,
            owner_id,
            classified.summary.total_cases,
            classified.summary.fraud_count
        );

        Ok(UploadOutcome::new(&meta, classified.summary))
    }

    pub fn model_info(&self) -> ModelInfo {
        let mut fingerprints = self.artifacts.fingerprints.clone();
        fingerprints.extend(self.classifier.fingerprint());

        ModelInfo {
            model_name: self.classifier.name(),
            layout: LayoutInfo::current(),
            labels: self.artifacts.labels.classes().to_vec(),
            diagnosis_vocabulary_size: self.artifacts.diagnosis.len(),
            fingerprints,
            loaded_at: self.loaded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::aggregate::{fraud_cases, national_report, summarize_table};
    use crate::features::FEATURE_VERSION;
    use crate::store::{InMemoryStore, RetryPolicy, RetryingStore, StoreError};
    use crate::test_utils::{
        csv_table, sample_artifacts, DiagnosisClassifier, FailingClassifier, FixedClassifier,
        HEADER,
    };

    fn pipeline() -> FraudPipeline {
        FraudPipeline::new(sample_artifacts(), Arc::new(DiagnosisClassifier))
    }

    const THREE_ROWS: &str = "P1,2024-01-01,2024-01-03,34,Male,Asthma,1200\n\
                              P2,2024-01-02,2024-01-09,61,Female,Diabetes,8400\n\
                              P3,2024-01-05,2024-01-05,12,Female,Asthma,300";

    #[test]
    fn test_classify_three_rows() {
        let table = csv_table(THREE_ROWS);
        let classified = pipeline().classify(&table).unwrap();

        let labels: Vec<&str> = classified.labels.iter().map(|l| l.as_str()).collect();
        assert_eq!(labels, vec!["No Fraud", "Billing Fraud", "No Fraud"]);
        assert_eq!(classified.summary, Summary::new(3, 1));
        assert_eq!(classified.summary.non_fraud_count, 2);

        let predictions = &classified.predictions;
        assert_eq!(predictions.headers().last().map(String::as_str), Some("Prediction"));
        assert_eq!(predictions.rows()[1][0], "P2");
        assert_eq!(predictions.rows()[1][7], "Billing Fraud");
    }

    #[test]
    fn test_classify_is_deterministic() {
        let table = csv_table(THREE_ROWS);
        let p = pipeline();
        assert_eq!(p.classify(&table).unwrap(), p.classify(&table).unwrap());
    }

    #[test]
    fn test_extra_columns_pass_through() {
        let table = RecordTable::from_csv_bytes(
            b"Ward,Patient ID,Date Admitted,Date Discharged,Age,Gender,Diagnosis,Amount Billed\n\
              B2,P1,2024-01-01,2024-01-02,40,Male,Malaria,900",
        )
        .unwrap();

        let classified = pipeline().classify(&table).unwrap();
        assert_eq!(classified.predictions.rows()[0][0], "B2");
        assert_eq!(classified.predictions.rows()[0][8], "Phantom Billing");
    }

    #[tokio::test]
    async fn test_reuploaded_prediction_column_overwritten() {
        // A downloaded result file sent back in, with stale labels
        let table = RecordTable::from_csv_bytes(
            format!(
                "{},Prediction\n\
                 P1,2024-01-01,2024-01-03,34,Female,Diabetes,1200,No Fraud\n\
                 P2,2024-01-02,2024-01-09,61,Male,Diabetes,8400,No Fraud",
                HEADER
            )
            .as_bytes(),
        )
        .unwrap();
        let store = InMemoryStore::new();

        let outcome = pipeline().process_upload(Uuid::new_v4(), &table, &store).await.unwrap();
        assert_eq!(outcome.summary, Summary::new(2, 2));

        let stored = store.get_detail(outcome.batch_id).await.unwrap().unwrap();
        let prediction_headers = stored.headers().iter().filter(|h| *h == "Prediction").count();
        assert_eq!(prediction_headers, 1);
        assert_eq!(summarize_table(&stored), outcome.summary);
        assert_eq!(national_report([&stored]).summary, outcome.summary);
        assert_eq!(fraud_cases([&stored]).len(), 2);

        let csv = String::from_utf8(stored.to_csv_bytes().unwrap()).unwrap();
        assert!(csv.starts_with(&format!("{},Prediction\n", HEADER)));
    }

    #[tokio::test]
    async fn test_process_upload_persists_batch() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let table = csv_table(THREE_ROWS);

        let outcome = pipeline().process_upload(owner, &table, &store).await.unwrap();

        assert_eq!(outcome.summary, Summary::new(3, 1));
        assert_eq!(store.get_summary(outcome.batch_id).await.unwrap(), Some(outcome.summary));
        assert_eq!(store.get_input(outcome.batch_id).await.unwrap(), Some(table));
        let batches = store.list_batches(owner).await.unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].row_count, 3);
    }

    #[tokio::test]
    async fn test_missing_diagnosis_persists_nothing() {
        let store = InMemoryStore::new();
        let table = RecordTable::from_csv_bytes(
            b"Patient ID,Date Admitted,Date Discharged,Age,Gender,Amount Billed\n\
              P1,2024-01-01,2024-01-02,40,Male,900",
        )
        .unwrap();

        match pipeline().process_upload(Uuid::new_v4(), &table, &store).await {
            Err(PipelineError::Schema { missing }) => assert_eq!(missing, vec!["Diagnosis"]),
            other => panic!("expected Schema error, got {:?}", other),
        }
        assert_eq!(store.batch_count(), 0);
        assert_eq!(store.summary_count(), 0);
    }

    #[tokio::test]
    async fn test_inverted_stay_rejects_whole_batch() {
        let store = InMemoryStore::new();
        let table = csv_table(
            "P1,2024-01-01,2024-01-03,34,Male,Asthma,1200\n\
             P2,2024-01-09,2024-01-02,61,Female,Diabetes,8400",
        );

        let result = pipeline().process_upload(Uuid::new_v4(), &table, &store).await;
        assert!(matches!(result, Err(PipelineError::DataFormat { .. })));
        assert_eq!(store.batch_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_diagnosis_persists_nothing() {
        let store = InMemoryStore::new();
        let table = csv_table("P1,2024-01-01,2024-01-03,34,Male,Influenza,1200");

        let result = pipeline().process_upload(Uuid::new_v4(), &table, &store).await;
        assert!(matches!(result, Err(PipelineError::Encoding { .. })));
        assert_eq!(store.batch_count(), 0);
    }

    #[test]
    fn test_prediction_count_mismatch() {
        let p = FraudPipeline::new(sample_artifacts(), Arc::new(FixedClassifier(vec![1])));
        let result = p.classify(&csv_table(THREE_ROWS));
        assert!(matches!(result, Err(PipelineError::Inference(_))));
    }

    #[test]
    fn test_unknown_class_index() {
        let p = FraudPipeline::new(sample_artifacts(), Arc::new(FixedClassifier(vec![1, 7, 1])));
        let result = p.classify(&csv_table(THREE_ROWS));
        assert!(matches!(result, Err(PipelineError::Inference(_))));
    }

    #[tokio::test]
    async fn test_classifier_failure_persists_nothing() {
        let store = InMemoryStore::new();
        let p = FraudPipeline::new(sample_artifacts(), Arc::new(FailingClassifier));

        let result = p.process_upload(Uuid::new_v4(), &csv_table(THREE_ROWS), &store).await;
        assert!(matches!(result, Err(PipelineError::Inference(_))));
        assert_eq!(store.batch_count(), 0);
    }

    #[tokio::test]
    async fn test_busy_store_retried_then_saved() {
        let store = RetryingStore::new(
            InMemoryStore::new(),
            RetryPolicy::new(5, Duration::from_millis(1)),
        );
        store.inner().simulate_busy(2);

        let outcome = pipeline()
            .process_upload(Uuid::new_v4(), &csv_table(THREE_ROWS), &store)
            .await
            .unwrap();
        assert_eq!(store.inner().batch_count(), 1);
        assert_eq!(outcome.summary.total_cases, 3);
    }

    #[tokio::test]
    async fn test_exhausted_store_surfaces_storage_error() {
        let store = RetryingStore::new(
            InMemoryStore::new(),
            RetryPolicy::new(3, Duration::from_millis(1)),
        );
        store.inner().simulate_busy(10);

        let result = pipeline()
            .process_upload(Uuid::new_v4(), &csv_table(THREE_ROWS), &store)
            .await;
        assert!(matches!(
            result,
            Err(PipelineError::Storage(StoreError::Exhausted { attempts: 3, .. }))
        ));
    }

    #[test]
    fn test_model_info() {
        let info = pipeline().model_info();
        assert_eq!(info.model_name, "diagnosis-fake");
        assert_eq!(info.layout.version, FEATURE_VERSION);
        assert_eq!(info.labels, vec!["Billing Fraud", "No Fraud", "Phantom Billing"]);
        assert_eq!(info.diagnosis_vocabulary_size, 3);
        assert!(info.fingerprints.is_empty());
    }
}
