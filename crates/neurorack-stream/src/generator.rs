//! Window generation: model calls, slicing and seam crossfades.
//!
//! A window of `block_count + 1` frames yields `block_count + 1` blocks of
//! audio. The first `block_count` are published; the last one is held back as
//! the tail and crossfaded into the first block of the next window, which
//! starts `block_count` frames later and so covers the same frame.

use crate::crossfade::LinearCrossfade;
use crate::{Error, Result};
use neurorack_core::{
    ConditioningFeatures, FeatureWindow, GenerativeModel, InferenceError, StreamConfig,
    DESCRIPTOR_COUNT,
};
use std::time::{Duration, Instant};

/// Unsliced model output for one window.
#[derive(Debug, Clone)]
pub struct RawWindow {
    pub start_frame: usize,
    pub samples: Vec<f32>,
    /// Wall time of the model call.
    pub elapsed: Duration,
}

/// Publishable chunks of one window plus the tail carried into the next.
#[derive(Debug, Clone)]
pub struct SlicedWindow {
    pub chunks: Vec<Box<[f32]>>,
    pub tail: Box<[f32]>,
}

pub struct BlockGenerator {
    model: Box<dyn GenerativeModel>,
    block_size: usize,
    crossfade: LinearCrossfade,
}

impl BlockGenerator {
    pub fn new(model: Box<dyn GenerativeModel>, config: &StreamConfig) -> Self {
        Self {
            model,
            block_size: config.block_size,
            crossfade: LinearCrossfade::new(config.block_size),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Run `passes` forward calls on a silent window so the first real
    /// window does not pay one-time backend costs.
    pub fn warm_up(&mut self, window_frames: usize, passes: usize) -> Result<()> {
        if passes == 0 {
            return Ok(());
        }
        let frames = vec![[0.0f32; DESCRIPTOR_COUNT]; window_frames];
        let window = FeatureWindow::from_frames(0, &frames);
        let start = Instant::now();
        for _ in 0..passes {
            let samples = self.model.forward(&window)?;
            self.check_len(window_frames, samples.len())?;
        }
        tracing::debug!(
            "Warmed up '{}' with {} pass(es) in {:.1} ms",
            self.model.name(),
            passes,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    /// Run the model on frames `[start_frame, start_frame + block_count + 1)`.
    pub fn generate_window(
        &mut self,
        features: &ConditioningFeatures,
        start_frame: usize,
        block_count: usize,
    ) -> Result<RawWindow> {
        let window_frames = block_count + 1;
        let window = features
            .window(start_frame, window_frames)
            .ok_or(Error::InsufficientFeatures {
                start_frame,
                window_frames,
                available: features.len(),
            })?;

        let start = Instant::now();
        let samples = self.model.forward(&window)?;
        let elapsed = start.elapsed();
        self.check_len(window_frames, samples.len())?;

        Ok(RawWindow {
            start_frame,
            samples,
            elapsed,
        })
    }

    /// Split a window into blocks, crossfading `carry_tail` into the first.
    ///
    /// No clipping or normalisation is applied.
    pub fn slice_and_crossfade(&self, raw: RawWindow, carry_tail: Option<&[f32]>) -> SlicedWindow {
        let mut chunks: Vec<Box<[f32]>> = raw
            .samples
            .chunks_exact(self.block_size)
            .map(Box::from)
            .collect();
        let tail = chunks.pop().unwrap_or_default();

        if let (Some(prev), Some(first)) = (carry_tail, chunks.first_mut()) {
            self.crossfade.apply(prev, first);
        }

        SlicedWindow { chunks, tail }
    }

    fn check_len(&self, window_frames: usize, actual: usize) -> Result<()> {
        let expected = window_frames * self.block_size;
        if actual != expected {
            return Err(Error::ModelInference(InferenceError::ShapeMismatch {
                expected,
                actual,
            }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use neurorack_core::ClosureModel;

    const BLOCK: usize = 8;

    fn config(blocks_per_window: usize) -> StreamConfig {
        StreamConfig {
            block_size: BLOCK,
            blocks_per_window,
            ..Default::default()
        }
    }

    /// Each frame's block is filled with that frame's loudness value.
    fn frame_value_model() -> Box<dyn GenerativeModel> {
        Box::new(ClosureModel::new("frame-value", |data, shape| {
            Ok((0..shape[0])
                .flat_map(|f| std::iter::repeat(data[f * shape[1]]).take(BLOCK))
                .collect())
        }))
    }

    /// Every sample of a window equals the window's start frame.
    fn window_start_model() -> Box<dyn GenerativeModel> {
        let mut calls = 0usize;
        Box::new(ClosureModel::new("window-start", move |_, shape| {
            let value = (calls * 3) as f32;
            calls += 1;
            Ok(vec![value; shape[0] * BLOCK])
        }))
    }

    fn ramp_features(len: usize) -> ConditioningFeatures {
        ConditioningFeatures::new((0..len).map(|i| [i as f32; DESCRIPTOR_COUNT]).collect())
    }

    #[test]
    fn test_generate_window_shape() {
        let mut generator = BlockGenerator::new(frame_value_model(), &config(3));
        let features = ramp_features(10);

        let raw = generator.generate_window(&features, 2, 3).unwrap();
        assert_eq!(raw.start_frame, 2);
        assert_eq!(raw.samples.len(), 4 * BLOCK);
        assert_eq!(raw.samples[0], 2.0);
        assert_eq!(raw.samples[3 * BLOCK], 5.0);
    }

    #[test]
    fn test_insufficient_features() {
        let mut generator = BlockGenerator::new(frame_value_model(), &config(3));
        let features = ramp_features(10);

        assert!(generator.generate_window(&features, 6, 3).is_ok());
        let err = generator.generate_window(&features, 7, 3).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientFeatures {
                start_frame: 7,
                window_frames: 4,
                available: 10
            }
        ));
    }

    #[test]
    fn test_shape_mismatch_is_inference_error() {
        let model = Box::new(ClosureModel::new("short", |_, _| Ok(vec![0.0; 3])));
        let mut generator = BlockGenerator::new(model, &config(3));
        let err = generator
            .generate_window(&ramp_features(10), 0, 3)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ModelInference(InferenceError::ShapeMismatch { expected: 32, actual: 3 })
        ));
    }

    #[test]
    fn test_slice_without_tail() {
        let mut generator = BlockGenerator::new(frame_value_model(), &config(3));
        let raw = generator
            .generate_window(&ramp_features(10), 0, 3)
            .unwrap();
        let sliced = generator.slice_and_crossfade(raw, None);

        assert_eq!(sliced.chunks.len(), 3);
        for (i, chunk) in sliced.chunks.iter().enumerate() {
            assert_eq!(chunk.len(), BLOCK);
            assert!(chunk.iter().all(|s| *s == i as f32));
        }
        assert!(sliced.tail.iter().all(|s| *s == 3.0));
    }

    #[test]
    fn test_seam_ramps_from_tail_to_new_window() {
        let mut generator = BlockGenerator::new(window_start_model(), &config(3));
        let features = ramp_features(20);

        let first = generator.generate_window(&features, 0, 3).unwrap();
        let first = generator.slice_and_crossfade(first, None);
        assert!(first.tail.iter().all(|s| *s == 0.0));

        let second = generator.generate_window(&features, 3, 3).unwrap();
        let second = generator.slice_and_crossfade(second, Some(&first.tail));

        let seam = &second.chunks[0];
        assert_eq!(seam[0], 0.0);
        assert_eq!(seam[BLOCK - 1], 3.0);
        for i in 1..BLOCK {
            let expected = 3.0 * i as f32 / (BLOCK - 1) as f32;
            assert_abs_diff_eq!(seam[i], expected, epsilon = 1e-6);
            assert!(seam[i] > seam[i - 1]);
        }
        // Only the first block of a window is blended.
        assert!(second.chunks[1].iter().all(|s| *s == 3.0));
    }

    #[test]
    fn test_seam_is_continuous_for_frame_conditioned_model() {
        let mut generator = BlockGenerator::new(frame_value_model(), &config(3));
        let features = ramp_features(20);

        let first = generator.generate_window(&features, 0, 3).unwrap();
        let first = generator.slice_and_crossfade(first, None);
        let second = generator.generate_window(&features, 3, 3).unwrap();
        let second = generator.slice_and_crossfade(second, Some(&first.tail));

        // Tail and head both render frame 3.
        assert!(second.chunks[0].iter().all(|s| *s == 3.0));
    }

    #[test]
    fn test_warm_up() {
        let mut generator = BlockGenerator::new(frame_value_model(), &config(3));
        assert!(generator.warm_up(4, 2).is_ok());
        assert!(generator.warm_up(4, 0).is_ok());

        let failing = Box::new(ClosureModel::new("broken", |_, _| {
            Err(InferenceError::BackendInit("no device".into()))
        }));
        let mut generator = BlockGenerator::new(failing, &config(3));
        assert!(matches!(generator.warm_up(4, 1), Err(Error::ModelInference(_))));
    }
}
