//! Test helpers and fixtures for Neurorack integration tests
//!
//! Deterministic test models stand in for a neural network: their output is
//! a pure function of the conditioning window, so tests can predict every
//! published sample.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (passthrough, single-source blends)
//! - `DSP_EPSILON` (1e-4): Descriptor extraction, resampling

#![allow(dead_code)]

pub mod tolerances;

use neurorack::prelude::*;
use neurorack::{AudioBlock, BlockRequestHandle, InferenceError, StreamConfig, DESCRIPTOR_COUNT};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Block size used by the pipeline scenarios.
pub const TEST_BLOCK_SIZE: usize = 512;

/// Analysis sample rate for WAV fixtures.
pub const TEST_SAMPLE_RATE: u32 = 22050;

/// Generous upper bound for anything the worker thread has to do.
pub const WAIT_TIMEOUT_MS: u64 = 5000;

/// Install a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Stream configuration with default window geometry, no warm-up and a
/// short idle wait so tests do not sit in the worker's park timeout.
pub fn test_stream_config() -> StreamConfig {
    StreamConfig {
        block_size: TEST_BLOCK_SIZE,
        warmup_passes: 0,
        idle_wait_ms: 2,
        ..Default::default()
    }
}

// =============================================================================
// Feature fixtures
// =============================================================================

/// Every descriptor of every frame equals `value`.
pub fn constant_features(len: usize, value: f32) -> ConditioningFeatures {
    ConditioningFeatures::new(vec![[value; DESCRIPTOR_COUNT]; len])
}

/// Frame `i` holds `offset + i * step` in every column.
pub fn ramp_features(len: usize, offset: f32, step: f32) -> ConditioningFeatures {
    ConditioningFeatures::new(
        (0..len)
            .map(|i| [offset + i as f32 * step; DESCRIPTOR_COUNT])
            .collect(),
    )
}

/// Distinct value per frame and per column, for exactness checks.
pub fn reference_features(len: usize, seed: u64) -> ConditioningFeatures {
    let mut rng = seed;
    ConditioningFeatures::new(
        (0..len)
            .map(|_| {
                let mut frame = [0.0; DESCRIPTOR_COUNT];
                for v in &mut frame {
                    rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1);
                    *v = (rng >> 40) as f32 / (1u64 << 24) as f32;
                }
                frame
            })
            .collect(),
    )
}

// =============================================================================
// Deterministic test models
// =============================================================================

/// Fills each block with the loudness column of the frame it renders.
///
/// Adjacent windows agree on the overlap frame, so seams are flat.
pub fn loudness_model(block_size: usize) -> ClosureModel {
    ClosureModel::new("loudness", move |data, shape| {
        Ok((0..shape[0])
            .flat_map(|f| std::iter::repeat(data[f * shape[1]]).take(block_size))
            .collect())
    })
}

/// Like [`loudness_model`], but each call waits until `gate` opens.
pub fn gated_loudness_model(block_size: usize, gate: Arc<AtomicBool>) -> ClosureModel {
    ClosureModel::new("gated-loudness", move |data, shape| {
        while !gate.load(Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok((0..shape[0])
            .flat_map(|f| std::iter::repeat(data[f * shape[1]]).take(block_size))
            .collect())
    })
}

/// Like [`gated_loudness_model`], and sets `entered` once a call is waiting
/// on the gate.
pub fn signalling_gated_model(
    block_size: usize,
    gate: Arc<AtomicBool>,
    entered: Arc<AtomicBool>,
) -> ClosureModel {
    ClosureModel::new("gated-loudness", move |data, shape| {
        entered.store(true, Ordering::Release);
        while !gate.load(Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok((0..shape[0])
            .flat_map(|f| std::iter::repeat(data[f * shape[1]]).take(block_size))
            .collect())
    })
}

/// Always fails.
pub fn failing_model() -> ClosureModel {
    ClosureModel::new("failing", |_, _| {
        Err(InferenceError::ForwardFailed("test failure".into()))
    })
}

// =============================================================================
// Polling
// =============================================================================

/// Poll `condition` every millisecond until it holds or `max_wait_ms` passes.
pub fn wait_for(max_wait_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    let timeout = Duration::from_millis(max_wait_ms);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Request `index` until it is ready.
pub fn wait_for_block(
    handle: &BlockRequestHandle,
    index: u64,
    max_wait_ms: u64,
) -> Option<Arc<AudioBlock>> {
    let mut block = None;
    wait_for(max_wait_ms, || {
        block = handle.request_block(index).into_block();
        block.is_some()
    });
    block
}

pub fn wait_for_state(handle: &BlockRequestHandle, state: PipelineState, max_wait_ms: u64) -> bool {
    wait_for(max_wait_ms, || handle.state() == state)
}

// =============================================================================
// Signal utilities
// =============================================================================

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f32, sample_rate: u32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Assert every sample equals `value` within `epsilon`.
pub fn assert_constant(samples: &[f32], value: f32, epsilon: f32, context: &str) {
    for (i, s) in samples.iter().enumerate() {
        assert!(
            (s - value).abs() <= epsilon,
            "{}: sample {} is {}, expected {}",
            context,
            i,
            s,
            value
        );
    }
}

// =============================================================================
// WAV fixtures
// =============================================================================

/// Write a mono 16-bit WAV file.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV");
    for s in samples {
        writer
            .write_sample((s.clamp(-1.0, 1.0) * 32767.0) as i16)
            .expect("Failed to write sample");
    }
    writer.finalize().expect("Failed to finalize WAV");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_features_are_deterministic() {
        let a = reference_features(10, 7);
        let b = reference_features(10, 7);
        assert_eq!(a, b);
        assert_ne!(a, reference_features(10, 8));
    }

    #[test]
    fn test_loudness_model_shape() {
        let mut model = loudness_model(4);
        let features = ramp_features(3, 1.0, 1.0);
        let window = features.window(0, 3).unwrap();
        let out = model.forward(&window).unwrap();
        assert_eq!(out, vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0, 3.0]);
    }
}
