//! Central Column & Label Constants
//!
//! Single source of truth for the upload format.
//! Header names must match the uploaded CSV exactly.

/// Opaque patient identifier (dropped before inference)
pub const COL_PATIENT_ID: &str = "Patient ID";

/// Admission date
pub const COL_DATE_ADMITTED: &str = "Date Admitted";

/// Discharge date
pub const COL_DATE_DISCHARGED: &str = "Date Discharged";

pub const COL_AGE: &str = "Age";
pub const COL_GENDER: &str = "Gender";
pub const COL_DIAGNOSIS: &str = "Diagnosis";
pub const COL_AMOUNT_BILLED: &str = "Amount Billed";

/// Derived column, only ever present in the scaler artifact
pub const COL_LENGTH_OF_STAY: &str = "Length of Stay";

/// Column appended to every prediction table
pub const COL_PREDICTION: &str = "Prediction";

/// Required upload columns, in the order errors report them
pub const REQUIRED_COLUMNS: &[&str] = &[
    COL_PATIENT_ID,
    COL_DATE_ADMITTED,
    COL_DATE_DISCHARGED,
    COL_AGE,
    COL_GENDER,
    COL_DIAGNOSIS,
    COL_AMOUNT_BILLED,
];

/// Numeric columns standardized by the frozen scaler, in scaler order
pub const SCALED_COLUMNS: &[&str] = &[COL_AGE, COL_AMOUNT_BILLED, COL_LENGTH_OF_STAY];

/// The only label that does not count as fraud
pub const NO_FRAUD_LABEL: &str = "No Fraud";

// ============================================
// Artifact file names (inside the model directory)
// ============================================

pub const MODEL_FILE: &str = "fraud_detection_model.onnx";
pub const SCALER_FILE: &str = "scaler.json";
pub const DIAGNOSIS_ENCODER_FILE: &str = "diagnosis_encoder.json";
pub const LABEL_ENCODER_FILE: &str = "fraud_encoder.json";

// ============================================
// Store retry defaults
// ============================================

/// Attempts before a busy store is treated as fatal
pub const DEFAULT_STORE_RETRY_ATTEMPTS: u32 = 5;

/// Fixed delay between attempts (milliseconds)
pub const DEFAULT_STORE_RETRY_DELAY_MS: u64 = 1000;
