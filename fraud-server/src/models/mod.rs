//! Data models

pub mod facility;
pub mod batch;

pub use facility::*;
pub use batch::*;
