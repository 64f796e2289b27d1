//! Centralized error type for the neurorack umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] neurorack_core::Error),

    #[error("Features: {0}")]
    Features(#[from] neurorack_features::Error),

    #[error("Stream: {0}")]
    Stream(#[from] neurorack_stream::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
