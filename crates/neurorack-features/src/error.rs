//! Error types for feature loading and combination.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Source audio could not be decoded or yielded no frames.
    #[error("Feature extraction failed for '{source_id}': {reason}")]
    FeatureExtraction { source_id: String, reason: String },

    #[error("Invalid blend weights: {0}")]
    InvalidWeights(String),

    #[error("Unknown feature source: {0}")]
    UnknownSource(String),

    #[error("No active feature set")]
    NoActiveFeatures,

    #[error(transparent)]
    Core(#[from] neurorack_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn extraction(source_id: &str, reason: impl std::fmt::Display) -> Self {
        Error::FeatureExtraction {
            source_id: source_id.to_string(),
            reason: reason.to_string(),
        }
    }
}
