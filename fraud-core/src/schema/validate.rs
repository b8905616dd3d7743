use chrono::NaiveDate;

use crate::constants::{
    COL_AGE, COL_AMOUNT_BILLED, COL_DATE_ADMITTED, COL_DATE_DISCHARGED, COL_DIAGNOSIS,
    COL_GENDER, REQUIRED_COLUMNS,
};
use crate::error::{PipelineError, PipelineResult};
use crate::table::RecordTable;
use super::dates::parse_date;

/// One row that passed validation. Numeric and categorical cells are
/// still raw: their validity is the transformer's concern.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord<'a> {
    pub admitted: NaiveDate,
    pub discharged: NaiveDate,
    pub age: &'a str,
    pub gender: &'a str,
    pub diagnosis: &'a str,
    pub amount_billed: &'a str,
}

/// Upload that passed schema and date checks
#[derive(Debug, Clone)]
pub struct ValidatedBatch<'a> {
    pub table: &'a RecordTable,
    pub records: Vec<ValidatedRecord<'a>>,
}

impl ValidatedBatch<'_> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Names of required columns absent from `table`, in required order
pub fn missing_columns(table: &RecordTable) -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .filter(|col| !table.has_column(col))
        .map(|col| col.to_string())
        .collect()
}

/// Validate an upload.
///
/// Fails with `Schema` when required columns are missing, and with
/// `DataFormat` when any date is unparsable, a discharge precedes its
/// admission, or the upload has no rows.
pub fn validate(table: &RecordTable) -> PipelineResult<ValidatedBatch<'_>> {
    let missing = missing_columns(table);
    if !missing.is_empty() {
        return Err(PipelineError::Schema { missing });
    }

    if table.is_empty() {
        return Err(PipelineError::data_format("upload contains no records"));
    }

    // Columns are known present past this point
    let idx = |name: &str| table.column_index(name).unwrap_or_default();
    let admitted_idx = idx(COL_DATE_ADMITTED);
    let discharged_idx = idx(COL_DATE_DISCHARGED);
    let age_idx = idx(COL_AGE);
    let gender_idx = idx(COL_GENDER);
    let diagnosis_idx = idx(COL_DIAGNOSIS);
    let amount_idx = idx(COL_AMOUNT_BILLED);

    let mut records = Vec::with_capacity(table.len());

    for (row_no, row) in table.rows().iter().enumerate().map(|(i, r)| (i + 1, r)) {
        let admitted = parse_row_date(row_no, COL_DATE_ADMITTED, &row[admitted_idx])?;
        let discharged = parse_row_date(row_no, COL_DATE_DISCHARGED, &row[discharged_idx])?;

        if discharged < admitted {
            return Err(PipelineError::data_format(format!(
                "row {}: '{}' ({}) is before '{}' ({})",
                row_no, COL_DATE_DISCHARGED, discharged, COL_DATE_ADMITTED, admitted
            )));
        }

        records.push(ValidatedRecord {
            admitted,
            discharged,
            age: &row[age_idx],
            gender: &row[gender_idx],
            diagnosis: &row[diagnosis_idx],
            amount_billed: &row[amount_idx],
        });
    }

    log::debug!("Validated {} records", records.len());

    Ok(ValidatedBatch { table, records })
}

fn parse_row_date(row_no: usize, column: &str, raw: &str) -> PipelineResult<NaiveDate> {
    parse_date(raw).ok_or_else(|| {
        PipelineError::data_format(format!(
            "row {}: invalid date format in '{}': '{}'",
            row_no, column, raw
        ))
    })
}
