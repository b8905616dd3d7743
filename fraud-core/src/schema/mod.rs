//! Schema Module - upload validation
//!
//! Checks required columns and dates before any transformation runs.
//! One bad row rejects the whole upload.

pub mod dates;
pub mod validate;


pub use dates::parse_date;
pub use validate::{validate, ValidatedBatch, ValidatedRecord};
