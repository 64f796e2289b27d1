//! Streaming block generation for the neural rack.
//!
//! A background worker runs the generative model one window at a time,
//! slices each window into fixed-size blocks and publishes them into a
//! lock-free ring. Consumers pull blocks by index from any thread.
//!
//! # Features
//!
//! - **Block generator**: windowed model calls with crossfaded seams
//! - **Worker thread**: lookahead-driven generation, coalesced restarts
//! - **Request handle**: RT-safe, never blocks, cloneable
//! - **Player**: buffer fills of any length for audio callbacks
//!
//! # Example
//!
//! ```ignore
//! use neurorack_stream::{BlockPlayer, StreamingPipeline};
//!
//! let pipeline = StreamingPipeline::builder()
//!     .model(model)
//!     .features(features)
//!     .build()?;
//!
//! // Audio thread
//! let mut player = BlockPlayer::new(pipeline.handle());
//! player.fill(&mut output);
//!
//! // Control thread
//! pipeline.notify_restart(Blend::new().with("bell", 0.3).with("drone", 0.7))?;
//! ```

pub mod error;
pub use error::{Error, Result};

mod command;
mod worker;

pub mod crossfade;
pub mod generator;
pub mod handle;
pub mod metrics;
pub mod pipeline;
pub mod player;
pub mod queue;
pub mod state;

pub use crossfade::LinearCrossfade;
pub use generator::{BlockGenerator, RawWindow, SlicedWindow};
pub use handle::BlockRequestHandle;
pub use metrics::{PipelineMetrics, PipelineMetricsSnapshot};
pub use pipeline::{StreamingPipeline, StreamingPipelineBuilder};
pub use player::{BlockPlayer, FillStatus};
pub use state::PipelineState;
