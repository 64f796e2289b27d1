//! Generative model seam.
//!
//! The model is opaque: it takes a window of conditioning frames and returns
//! audio samples. No ML framework types cross this boundary; backends
//! (ONNX Runtime, candle, Burn, ...) adapt themselves to [`GenerativeModel`]
//! or hand a flat-tensor closure to [`ClosureModel`].

use crate::features::FeatureWindow;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Forward pass failed: {0}")]
    ForwardFailed(String),

    #[error("Model output has {actual} samples, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Backend initialization failed: {0}")]
    BackendInit(String),
}

/// Synchronous feature-to-audio model.
///
/// Owned by the generation worker thread, so only `Send` is required.
/// `forward` may take a long time relative to one audio block; it is never
/// called from the audio thread.
pub trait GenerativeModel: Send {
    /// Produce `window.len() * block_size` samples, where each frame conditions
    /// one block.
    fn forward(&mut self, window: &FeatureWindow<'_>) -> Result<Vec<f32>, InferenceError>;

    fn name(&self) -> &str {
        "model"
    }
}

impl<M: GenerativeModel + ?Sized> GenerativeModel for Box<M> {
    fn forward(&mut self, window: &FeatureWindow<'_>) -> Result<Vec<f32>, InferenceError> {
        (**self).forward(window)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Flat-tensor forward closure: `(data, [frames, descriptors]) -> samples`.
pub type ForwardFn = Box<dyn FnMut(&[f32], [usize; 2]) -> Result<Vec<f32>, InferenceError> + Send>;

/// Adapts a [`ForwardFn`] to [`GenerativeModel`].
pub struct ClosureModel {
    name: String,
    forward: ForwardFn,
}

impl ClosureModel {
    pub fn new<F>(name: impl Into<String>, forward: F) -> Self
    where
        F: FnMut(&[f32], [usize; 2]) -> Result<Vec<f32>, InferenceError> + Send + 'static,
    {
        Self {
            name: name.into(),
            forward: Box::new(forward),
        }
    }
}

impl GenerativeModel for ClosureModel {
    fn forward(&mut self, window: &FeatureWindow<'_>) -> Result<Vec<f32>, InferenceError> {
        let data = window.to_flat();
        (self.forward)(&data, window.shape())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for ClosureModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureModel")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
