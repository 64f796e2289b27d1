//! Tolerance constants for feature and audio tests.

/// Floating point rounding errors (passthrough, single-source blends).
/// Use for operations that should be mathematically exact.
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Descriptor extraction and resampling tolerance.
pub const DSP_EPSILON: f32 = 1e-4;

/// Relative tolerance for blends whose weights went through normalisation.
pub const BLEND_EPSILON: f32 = 1e-5;

/// 16-bit quantization step size.
/// Use when comparing against 16-bit WAV fixtures.
pub const INT16_EPSILON: f32 = 1.0 / 32768.0;
