//! Feature Transformer
//!
//! Validated records → encoded, scaled feature vectors.
//! Pure function of its input plus the frozen artifacts.

use crate::constants::{COL_AGE, COL_AMOUNT_BILLED, COL_DIAGNOSIS, COL_GENDER};
use crate::error::{PipelineError, PipelineResult};
use crate::model::artifacts::{CategoryEncoder, StandardScaler};
use crate::schema::{ValidatedBatch, ValidatedRecord};
use super::layout::{
    FEATURE_COUNT, IDX_AGE, IDX_AMOUNT_BILLED, IDX_DIAGNOSIS, IDX_GENDER, IDX_LENGTH_OF_STAY,
};
use super::vector::{FeatureMatrix, FeatureVector};

/// Encoded gender values used at training time
pub fn encode_gender(value: &str) -> Option<f32> {
    match value.trim() {
        "Male" => Some(1.0),
        "Female" => Some(0.0),
        _ => None,
    }
}

/// Whole days between admission and discharge
pub fn length_of_stay(record: &ValidatedRecord<'_>) -> i64 {
    (record.discharged - record.admitted).num_days()
}

pub struct FeatureTransformer<'a> {
    scaler: &'a StandardScaler,
    diagnosis: &'a CategoryEncoder,
}

impl<'a> FeatureTransformer<'a> {
    pub fn new(scaler: &'a StandardScaler, diagnosis: &'a CategoryEncoder) -> Self {
        Self { scaler, diagnosis }
    }

    /// Transform a whole batch; the first bad row fails it
    pub fn transform(&self, batch: &ValidatedBatch<'_>) -> PipelineResult<FeatureMatrix> {
        let rows = batch
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| self.transform_record(i + 1, record))
            .collect::<PipelineResult<Vec<_>>>()?;

        if let Some(first) = rows.first() {
            log::trace!("First feature row: {}", first.to_log_entry());
        }

        Ok(FeatureMatrix::new(rows))
    }

    /// Transform one record. `row_no` is 1-based and only used in errors.
    pub fn transform_record(
        &self,
        row_no: usize,
        record: &ValidatedRecord<'_>,
    ) -> PipelineResult<FeatureVector> {
        let stay = length_of_stay(record);
        if stay < 0 {
            return Err(PipelineError::data_format(format!(
                "row {}: negative length of stay ({} days)",
                row_no, stay
            )));
        }

        let gender = encode_gender(record.gender)
            .ok_or_else(|| PipelineError::encoding(COL_GENDER, record.gender))?;

        let diagnosis = self
            .diagnosis
            .encode(record.diagnosis.trim())
            .ok_or_else(|| PipelineError::encoding(COL_DIAGNOSIS, record.diagnosis))?;

        let age = parse_number(row_no, COL_AGE, record.age)?;
        let amount = parse_number(row_no, COL_AMOUNT_BILLED, record.amount_billed)?;

        let [age_scaled, amount_scaled, stay_scaled] =
            self.scaler.transform([age, amount, stay as f64]);

        let mut values = [0.0f32; FEATURE_COUNT];
        values[IDX_AGE] = age_scaled as f32;
        values[IDX_GENDER] = gender;
        values[IDX_DIAGNOSIS] = diagnosis as f32;
        values[IDX_AMOUNT_BILLED] = amount_scaled as f32;
        values[IDX_LENGTH_OF_STAY] = stay_scaled as f32;

        Ok(FeatureVector::from_values(values))
    }
}

fn parse_number(row_no: usize, column: &str, raw: &str) -> PipelineResult<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            PipelineError::data_format(format!(
                "row {}: '{}' is not a number: '{}'",
                row_no, column, raw
            ))
        })
}
