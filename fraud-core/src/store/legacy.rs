//! Legacy count normalization
//!
//! Older databases hold some summary counts as raw little-endian byte
//! strings instead of integers, and some rows have no count at all.
//! Stores decode through [`StoredCount`] so callers only see integers.

use super::{StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredCount {
    Integer(i64),
    /// Unsigned little-endian bytes
    LegacyBytes(Vec<u8>),
    Absent,
}

impl StoredCount {
    pub fn normalize(&self) -> StoreResult<i64> {
        match self {
            StoredCount::Integer(v) => Ok(*v),
            StoredCount::Absent => Ok(0),
            StoredCount::LegacyBytes(bytes) => decode_le(bytes),
        }
    }
}

impl From<Option<i64>> for StoredCount {
    fn from(value: Option<i64>) -> Self {
        value.map_or(StoredCount::Absent, StoredCount::Integer)
    }
}

fn decode_le(bytes: &[u8]) -> StoreResult<i64> {
    let (low, high) = bytes.split_at(bytes.len().min(8));
    if high.iter().any(|&b| b != 0) {
        return Err(StoreError::Permanent(format!(
            "legacy count of {} bytes does not fit in 64 bits",
            bytes.len()
        )));
    }

    let mut buf = [0u8; 8];
    buf[..low.len()].copy_from_slice(low);
    let value = u64::from_le_bytes(buf);

    i64::try_from(value).map_err(|_| {
        StoreError::Permanent(format!("legacy count {} exceeds the integer range", value))
    })
}
