//! Aggregation Engine
//!
//! Pure reductions over prediction results. Nothing here mutates a
//! stored batch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::{COL_PREDICTION, NO_FRAUD_LABEL};
use crate::model::labels::PredictionLabel;
use crate::table::RecordTable;

// ============================================================================
// SUMMARY
// ============================================================================

/// Fraud counts of one batch, or of several combined.
///
/// Invariant: `fraud_count + non_fraud_count == total_cases`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total_cases: i64,
    pub fraud_count: i64,
    pub non_fraud_count: i64,
}

impl Summary {
    /// Build from totals; the non-fraud count is derived
    pub fn new(total_cases: i64, fraud_count: i64) -> Self {
        Self {
            total_cases,
            fraud_count,
            non_fraud_count: total_cases - fraud_count,
        }
    }

    pub fn from_labels<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a PredictionLabel>,
    {
        let (total, fraud) = labels
            .into_iter()
            .fold((0i64, 0i64), |(total, fraud), label| {
                (total + 1, fraud + i64::from(label.is_fraud()))
            });
        Self::new(total, fraud)
    }

    pub fn merge(self, other: Summary) -> Summary {
        Summary {
            total_cases: self.total_cases + other.total_cases,
            fraud_count: self.fraud_count + other.fraud_count,
            non_fraud_count: self.non_fraud_count + other.non_fraud_count,
        }
    }

    /// Sum of many summaries (an empty input gives all zeros)
    pub fn combine<I>(summaries: I) -> Summary
    where
        I: IntoIterator<Item = Summary>,
    {
        summaries.into_iter().fold(Summary::default(), Summary::merge)
    }

    pub fn is_consistent(&self) -> bool {
        self.total_cases >= 0
            && self.fraud_count >= 0
            && self.non_fraud_count >= 0
            && self.fraud_count + self.non_fraud_count == self.total_cases
    }

    /// Fraction of cases flagged, 0.0 for an empty batch
    pub fn fraud_rate(&self) -> f64 {
        if self.total_cases == 0 {
            0.0
        } else {
            self.fraud_count as f64 / self.total_cases as f64
        }
    }
}

// ============================================================================
// BREAKDOWN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

/// Labels read from a prediction table's `Prediction` column.
/// A table without that column yields no labels.
pub fn table_labels(table: &RecordTable) -> Vec<PredictionLabel> {
    table
        .column(COL_PREDICTION)
        .map(|cells| cells.map(PredictionLabel::from).collect())
        .unwrap_or_default()
}

/// Count rows per distinct label.
///
/// Sorted by descending count, ties broken by label, so output is stable.
pub fn breakdown<'a, I>(labels: I) -> Vec<LabelCount>
where
    I: IntoIterator<Item = &'a PredictionLabel>,
{
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for label in labels {
        *counts.entry(label.as_str()).or_insert(0) += 1;
    }

    let mut result: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, count)| LabelCount {
            label: label.to_string(),
            count,
        })
        .collect();
    result.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    result
}

pub fn summarize_table(table: &RecordTable) -> Summary {
    Summary::from_labels(&table_labels(table))
}

pub fn label_breakdown(table: &RecordTable) -> Vec<LabelCount> {
    breakdown(&table_labels(table))
}

// ============================================================================
// NATIONAL VIEW
// ============================================================================

/// Cross-batch aggregation over any set of prediction tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NationalReport {
    pub batch_count: usize,
    pub summary: Summary,
    pub breakdown: Vec<LabelCount>,
}

/// Concatenate predictions from every table and recompute.
///
/// Duplicates are counted as given; avoiding overlap is the caller's job.
pub fn national_report<'a, I>(tables: I) -> NationalReport
where
    I: IntoIterator<Item = &'a RecordTable>,
{
    let mut batch_count = 0;
    let mut labels = Vec::new();
    for table in tables {
        batch_count += 1;
        labels.extend(table_labels(table));
    }

    NationalReport {
        batch_count,
        summary: Summary::from_labels(&labels),
        breakdown: breakdown(&labels),
    }
}

// ============================================================================
// DETAILED FRAUD VIEW
// ============================================================================

/// Rows flagged as fraud across `tables`, original cells preserved
pub fn fraud_cases<'a, I>(tables: I) -> RecordTable
where
    I: IntoIterator<Item = &'a RecordTable>,
{
    let filtered: Vec<RecordTable> = tables
        .into_iter()
        .filter_map(|table| {
            let idx = table.column_index(COL_PREDICTION)?;
            let fraud = table.filter_rows(|row| row[idx] != NO_FRAUD_LABEL);
            (!fraud.is_empty()).then_some(fraud)
        })
        .collect();

    RecordTable::concat(&filtered)
}
