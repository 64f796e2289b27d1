//! # Neurorack - Neural Generative Audio Instrument
//!
//! Generates audio from timbral descriptors with a neural model, in fixed-size
//! blocks, while the user switches, blends and morphs the conditioning
//! features in real time.
//!
//! ## Architecture
//!
//! Neurorack is an umbrella crate that coordinates:
//! - **neurorack-core** - Shared types (features, blocks, selectors, model seam, config)
//! - **neurorack-features** - Feature store (decoding, extraction, cache, blend, morph)
//! - **neurorack-stream** - Streaming pipeline (worker, block ring, request handle, player)
//!
//! ## Quick Start
//!
//! ```ignore
//! use neurorack::prelude::*;
//!
//! let rack = Neurorack::builder()
//!     .config_file("rack.toml")
//!     .model(ClosureModel::new("ddsp", |data, shape| run_onnx(data, shape)))
//!     .build()?;
//!
//! // Audio thread
//! let mut player = rack.player();
//! player.fill(&mut buffer);
//!
//! // Control thread
//! rack.handle_control(cv_blend(&["bell", "drone"], &[1.5, -0.5]).into())?;
//! ```

/// Re-export of neurorack-core for direct access
pub use neurorack_core as core;
/// Re-export of neurorack-features for direct access
pub use neurorack_features as features;
/// Re-export of neurorack-stream for direct access
pub use neurorack_stream as stream;

pub use neurorack_core::{
    AudioBlock, Blend, BlockResponse, ClosureModel, ConditioningFeatures, Descriptor,
    FeatureConfig, FeatureSelector, FeatureWindow, GenerativeModel, InferenceError, RackConfig,
    SourceConfig, SourceId, StreamConfig, DESCRIPTOR_COUNT,
};
pub use neurorack_features::{FeatureStore, Morph};
pub use neurorack_stream::{
    BlockPlayer, BlockRequestHandle, FillStatus, PipelineMetricsSnapshot, PipelineState,
    StreamingPipeline,
};

mod builder;
pub mod control;
mod error;
mod instrument;

pub use builder::NeurorackBuilder;
pub use control::{cv_blend, cv_crossfade, cv_descriptor_morph, cv_to_unit, ControlEvent};
pub use error::{Error, Result};
pub use instrument::Neurorack;

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{Neurorack, NeurorackBuilder};

    pub use crate::control::{cv_blend, cv_crossfade, cv_descriptor_morph, ControlEvent};

    pub use crate::core::{
        Blend, BlockResponse, ClosureModel, ConditioningFeatures, Descriptor, FeatureSelector,
        GenerativeModel, RackConfig,
    };
    pub use crate::features::Morph;
    pub use crate::stream::{BlockPlayer, FillStatus, PipelineState};
}
