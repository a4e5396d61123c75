//! Error types for the classification cascade.
//!
//! Configuration problems are fatal and surface before any image is routed.
//! Input and classifier failures are scoped to a single image.

use thiserror::Error;

use crate::engine::slot::ClassifierSlot;

/// Boxed error carried by classifier failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced by the cascade and its collaborators.
#[derive(Error, Debug)]
pub enum CascadeError {
    /// A classifier slot is missing or mismatched, a model file is absent,
    /// or a configuration value is out of range.
    #[error("configuration: {message}")]
    Configuration { message: String },

    /// An image does not satisfy the shape or decoding contract.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// A classifier failed while evaluating an image.
    #[error("classifier `{slot}` failed")]
    ClassifierFailure {
        slot: ClassifierSlot,
        #[source]
        source: BoxError,
    },

    #[error("io")]
    Io(#[from] std::io::Error),

    #[error("csv")]
    Csv(#[from] csv::Error),
}

impl CascadeError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn classifier(slot: ClassifierSlot, source: impl Into<BoxError>) -> Self {
        Self::ClassifierFailure {
            slot,
            source: source.into(),
        }
    }

    /// True for errors that only affect the image being processed.
    pub fn is_per_image(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::ClassifierFailure { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CascadeError>;
