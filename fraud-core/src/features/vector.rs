use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::layout::{
    feature_index, layout_hash, validate_layout, LayoutMismatchError, FEATURE_COUNT,
    FEATURE_LAYOUT, FEATURE_VERSION,
};

/// One encoded, scaled record, tagged with the layout it was built for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub version: u8,
    pub layout_hash: u32,
    pub values: [f32; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn from_values(values: [f32; FEATURE_COUNT]) -> Self {
        FeatureVector {
            version: FEATURE_VERSION,
            layout_hash: layout_hash(),
            values,
        }
    }

    pub fn get_by_name(&self, name: &str) -> Option<f32> {
        feature_index(name).map(|i| self.values[i])
    }

    pub fn validate(&self) -> Result<(), LayoutMismatchError> {
        validate_layout(self.version, self.layout_hash)
    }

    /// Values keyed by feature name, for debug logs
    pub fn to_log_entry(&self) -> serde_json::Value {
        let named: serde_json::Map<String, serde_json::Value> = FEATURE_LAYOUT
            .iter()
            .zip(self.values)
            .map(|(name, value)| (name.to_string(), value.into()))
            .collect();

        serde_json::json!({
            "layout": format!("v{}/{:08x}", self.version, self.layout_hash),
            "values": named,
        })
    }
}

/// Feature vectors of one batch, in input row order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    rows: Vec<FeatureVector>,
}

impl FeatureMatrix {
    pub fn new(rows: Vec<FeatureVector>) -> Self {
        FeatureMatrix { rows }
    }

    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn validate(&self) -> Result<(), LayoutMismatchError> {
        self.rows.iter().try_for_each(FeatureVector::validate)
    }

    /// Dense `(rows, FEATURE_COUNT)` model input
    pub fn to_array(&self) -> Array2<f32> {
        Array2::from_shape_fn((self.rows.len(), FEATURE_COUNT), |(row, col)| {
            self.rows[row].values[col]
        })
    }
}
