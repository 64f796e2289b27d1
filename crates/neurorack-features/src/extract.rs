//! Descriptor extraction.
//!
//! Frames are centred: the signal is zero-padded by `fft_size / 2` on both
//! sides and frame `t` starts at `t * hop_size` in the padded signal. Each
//! frame yields one value per [`Descriptor`]. Non-finite values become 1.0
//! and the final (mostly padding) frame is dropped.

use crate::pitch::YinTracker;
use neurorack_core::{ConditioningFeatures, Descriptor, FeatureConfig, Frame, DESCRIPTOR_COUNT};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

const FLATNESS_AMIN: f32 = 1e-10;
const ZERO_CROSSING_THRESHOLD: f32 = 1e-10;

pub struct FeatureExtractor {
    sample_rate: u32,
    fft_size: usize,
    hop_size: usize,
    rolloff_percent: f32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// Centre frequency of each magnitude bin
    bin_freqs: Vec<f32>,
    yin: YinTracker,

    spectrum: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl FeatureExtractor {
    pub fn new(config: &FeatureConfig) -> Self {
        let fft_size = config.fft_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Periodic Hann
        let window = (0..fft_size)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / fft_size as f32).cos())
            .collect();

        let bins = fft_size / 2 + 1;
        let bin_freqs = (0..bins)
            .map(|k| k as f32 * config.sample_rate as f32 / fft_size as f32)
            .collect();

        Self {
            sample_rate: config.sample_rate,
            fft_size,
            hop_size: config.hop_size,
            rolloff_percent: config.rolloff_percent,
            fft,
            window,
            bin_freqs,
            yin: YinTracker::new(
                config.sample_rate,
                fft_size,
                config.pitch_min_hz,
                config.pitch_max_hz,
            ),
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            magnitudes: vec![0.0; bins],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames [`extract`](Self::extract) yields for `num_samples` samples.
    pub fn frame_count(&self, num_samples: usize) -> usize {
        if num_samples == 0 {
            0
        } else {
            num_samples / self.hop_size
        }
    }

    /// Extract descriptor frames from mono samples at the configured rate.
    pub fn extract(&mut self, samples: &[f32]) -> ConditioningFeatures {
        let frame_count = self.frame_count(samples.len());
        if frame_count == 0 {
            return ConditioningFeatures::default();
        }

        let pad = self.fft_size / 2;
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let mut frames: Vec<Frame> = Vec::with_capacity(frame_count);
        for t in 0..frame_count {
            let start = t * self.hop_size;
            let frame = &padded[start..start + self.fft_size];
            frames.push(self.analyze_frame(frame));
        }

        for frame in &mut frames {
            for value in frame.iter_mut() {
                if !value.is_finite() {
                    *value = 1.0;
                }
            }
        }

        ConditioningFeatures::new(frames)
    }

    fn analyze_frame(&mut self, frame: &[f32]) -> Frame {
        let mut out = [0.0f32; DESCRIPTOR_COUNT];

        out[Descriptor::Loudness.index()] = rms(frame);
        out[Descriptor::ZeroCrossingRate.index()] = zero_crossing_rate(frame);

        self.compute_magnitudes(frame);
        let centroid = self.spectral_centroid();
        out[Descriptor::SpectralRolloff.index()] = self.spectral_rolloff();
        out[Descriptor::SpectralFlatness.index()] = self.spectral_flatness();
        out[Descriptor::SpectralBandwidth.index()] = self.spectral_bandwidth(centroid);
        out[Descriptor::SpectralCentroid.index()] = centroid;
        out[Descriptor::Pitch.index()] = self.yin.estimate(frame);

        out
    }

    fn compute_magnitudes(&mut self, frame: &[f32]) {
        for ((bin, &sample), &w) in self.spectrum.iter_mut().zip(frame).zip(&self.window) {
            *bin = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.spectrum);
        for (mag, bin) in self.magnitudes.iter_mut().zip(&self.spectrum) {
            *mag = bin.norm();
        }
    }

    fn spectral_centroid(&self) -> f32 {
        let total: f32 = self.magnitudes.iter().sum();
        if total <= f32::EPSILON {
            return 0.0;
        }
        self.magnitudes
            .iter()
            .zip(&self.bin_freqs)
            .map(|(m, f)| m * f)
            .sum::<f32>()
            / total
    }

    fn spectral_bandwidth(&self, centroid: f32) -> f32 {
        let total: f32 = self.magnitudes.iter().sum();
        if total <= f32::EPSILON {
            return 0.0;
        }
        let variance: f32 = self
            .magnitudes
            .iter()
            .zip(&self.bin_freqs)
            .map(|(m, f)| (m / total) * (f - centroid).powi(2))
            .sum();
        variance.sqrt()
    }

    fn spectral_rolloff(&self) -> f32 {
        let total: f32 = self.magnitudes.iter().sum();
        let threshold = self.rolloff_percent * total;
        let mut cumulative = 0.0f32;
        for (mag, freq) in self.magnitudes.iter().zip(&self.bin_freqs) {
            cumulative += mag;
            if cumulative >= threshold {
                return *freq;
            }
        }
        self.bin_freqs.last().copied().unwrap_or(0.0)
    }

    fn spectral_flatness(&self) -> f32 {
        let n = self.magnitudes.len() as f32;
        let mut log_sum = 0.0f32;
        let mut sum = 0.0f32;
        for &mag in &self.magnitudes {
            let power = (mag * mag).max(FLATNESS_AMIN);
            log_sum += power.ln();
            sum += power;
        }
        (log_sum / n).exp() / (sum / n)
    }
}

fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

/// Fraction of adjacent sample pairs whose sign differs. Near-zero samples count as positive.
fn zero_crossing_rate(frame: &[f32]) -> f32 {
    if frame.len() < 2 {
        return 0.0;
    }
    let negative = |s: f32| s < -ZERO_CROSSING_THRESHOLD;
    let crossings = frame
        .windows(2)
        .filter(|pair| negative(pair[0]) != negative(pair[1]))
        .count();
    crossings as f32 / frame.len() as f32
}
