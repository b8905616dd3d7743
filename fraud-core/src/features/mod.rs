//! Features Module - Feature Transformation Engine
//!
//! - `layout` - versioned feature order (single source of truth)
//! - `vector` - feature vectors and the batch matrix
//! - `transform` - record → feature vector

pub mod layout;
pub mod transform;
pub mod vector;


// Re-export common types
pub use layout::{layout_hash, LayoutInfo, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION};
pub use transform::FeatureTransformer;
pub use vector::{FeatureMatrix, FeatureVector};
