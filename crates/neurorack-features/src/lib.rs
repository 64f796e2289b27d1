//! Feature store for the neural rack.
//!
//! Turns audio sources into conditioning features and combines them:
//!
//! - [`decode`] - WAV decoding, mixdown and resampling
//! - [`extract`] - loudness, zero-crossing, spectral and pitch descriptors
//! - [`cache`] - on-disk feature persistence
//! - [`blend`] - weighted blends and per-descriptor morphs
//! - [`store`] - [`FeatureStore`], which owns sources and the active feature set

pub mod blend;
pub mod cache;
pub mod decode;
pub mod error;
pub mod extract;
pub mod pitch;
pub mod store;

pub use blend::Morph;
pub use cache::FeatureCache;
pub use error::{Error, Result};
pub use extract::FeatureExtractor;
pub use pitch::YinTracker;
pub use store::FeatureStore;
