//! Service layer module

pub mod inference;
pub mod types;

pub use inference::{ImageLoader, InferenceService};
pub use types::*;
