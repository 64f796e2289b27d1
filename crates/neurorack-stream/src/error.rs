//! Error types for block generation and the streaming pipeline.

use neurorack_core::InferenceError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The requested window runs past the end of the feature set.
    #[error("Window at frame {start_frame} needs {window_frames} frames, only {available} available")]
    InsufficientFeatures {
        start_frame: usize,
        window_frames: usize,
        available: usize,
    },

    #[error("Model inference failed: {0}")]
    ModelInference(#[from] InferenceError),

    #[error("Pipeline command queue is full")]
    CommandQueueFull,

    #[error("Pipeline worker has stopped")]
    PipelineStopped,

    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] neurorack_core::Error),
}
