//! Error types for core configuration and feature resolution.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A feature selector could not be turned into a concrete feature set.
    #[error("Feature resolution failed: {0}")]
    FeatureResolution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
