//! Shared types for the neural rack instrument.
//!
//! - Conditioning features and descriptor columns
//! - Audio blocks and block responses
//! - Feature selection and the provider seam used on restart
//! - The generative model seam
//! - Configuration

pub mod block;
pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod selector;

pub use block::{AudioBlock, BlockResponse};
pub use config::{FeatureConfig, RackConfig, SourceConfig, StreamConfig};
pub use error::{Error, Result};
pub use features::{ConditioningFeatures, Descriptor, FeatureWindow, Frame, DESCRIPTOR_COUNT};
pub use model::{ClosureModel, ForwardFn, GenerativeModel, InferenceError};
pub use selector::{Blend, FeatureProvider, FeatureSelector, SourceId, StaticFeatures};
