//! Pinned feature order of the classifier input
//!
//! The model was trained on columns in exactly this order. A reordered
//! vector raises nothing downstream, it just yields wrong labels, so every
//! vector carries the layout version and a CRC32 of the layout.
//!
//! Any change to `FEATURE_LAYOUT` (added, removed or moved entry) bumps
//! `FEATURE_VERSION` and requires retrained artifacts.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

pub const FEATURE_VERSION: u8 = 1;

pub const FEATURE_LAYOUT: &[&str] = &[
    "age",            // standardized
    "gender",         // Male=1, Female=0
    "diagnosis",      // vocabulary index, unscaled
    "amount_billed",  // standardized
    "length_of_stay", // whole days, standardized
];

pub const FEATURE_COUNT: usize = 5;

const _: () = assert!(FEATURE_LAYOUT.len() == FEATURE_COUNT);

pub const IDX_AGE: usize = 0;
pub const IDX_GENDER: usize = 1;
pub const IDX_DIAGNOSIS: usize = 2;
pub const IDX_AMOUNT_BILLED: usize = 3;
pub const IDX_LENGTH_OF_STAY: usize = 4;

fn hash_layout(version: u8) -> u32 {
    let mut crc = Hasher::new();
    for name in FEATURE_LAYOUT {
        crc.update(name.as_bytes());
        crc.update(b",");
    }
    crc.update(&version.to_le_bytes());
    crc.finalize()
}

pub fn layout_hash() -> u32 {
    hash_layout(FEATURE_VERSION)
}

pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|candidate| *candidate == name)
}

/// Layout description reported alongside the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        LayoutInfo {
            version: FEATURE_VERSION,
            hash: layout_hash(),
            feature_count: FEATURE_COUNT,
            feature_names: FEATURE_LAYOUT.iter().copied().map(String::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("feature layout v{found_version} ({found_hash:08x}) does not match v{expected_version} ({expected_hash:08x})")]
pub struct LayoutMismatchError {
    pub found_version: u8,
    pub found_hash: u32,
    pub expected_version: u8,
    pub expected_hash: u32,
}

/// Accept only vectors built against the current layout
pub fn validate_layout(version: u8, hash: u32) -> Result<(), LayoutMismatchError> {
    let expected_hash = layout_hash();
    if version == FEATURE_VERSION && hash == expected_hash {
        Ok(())
    } else {
        Err(LayoutMismatchError {
            found_version: version,
            found_hash: hash,
            expected_version: FEATURE_VERSION,
            expected_hash,
        })
    }
}
