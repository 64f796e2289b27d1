//! Conditioning feature types.
//!
//! A feature set is an ordered sequence of frames. Each frame holds one value
//! per [`Descriptor`] and conditions exactly one audio block of the model output.

use serde::{Deserialize, Serialize};

/// Number of descriptor columns per frame.
pub const DESCRIPTOR_COUNT: usize = 7;

/// One frame of descriptor values, in [`Descriptor::ALL`] column order.
pub type Frame = [f32; DESCRIPTOR_COUNT];

/// Timbral descriptor columns the model is conditioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Descriptor {
    /// Frame RMS.
    Loudness,
    ZeroCrossingRate,
    SpectralRolloff,
    SpectralFlatness,
    SpectralBandwidth,
    SpectralCentroid,
    /// Fundamental frequency in Hz.
    Pitch,
}

impl Descriptor {
    pub const ALL: [Descriptor; DESCRIPTOR_COUNT] = [
        Descriptor::Loudness,
        Descriptor::ZeroCrossingRate,
        Descriptor::SpectralRolloff,
        Descriptor::SpectralFlatness,
        Descriptor::SpectralBandwidth,
        Descriptor::SpectralCentroid,
        Descriptor::Pitch,
    ];

    /// Column index inside a [`Frame`].
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Descriptor::Loudness => "loudness",
            Descriptor::ZeroCrossingRate => "zero_crossing_rate",
            Descriptor::SpectralRolloff => "spectral_rolloff",
            Descriptor::SpectralFlatness => "spectral_flatness",
            Descriptor::SpectralBandwidth => "spectral_bandwidth",
            Descriptor::SpectralCentroid => "spectral_centroid",
            Descriptor::Pitch => "pitch",
        }
    }
}

/// Immutable, ordered conditioning frames.
///
/// Shared between the feature store and the generation worker as
/// `Arc<ConditioningFeatures>`; a new blend produces a new value rather than
/// mutating one that a worker may be reading.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConditioningFeatures {
    frames: Vec<Frame>,
}

impl ConditioningFeatures {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    /// Build from row-major `[frames, DESCRIPTOR_COUNT]` data.
    ///
    /// Returns `None` if the length is not a multiple of the descriptor count.
    pub fn from_flat(data: &[f32]) -> Option<Self> {
        if data.len() % DESCRIPTOR_COUNT != 0 {
            return None;
        }
        let frames = data
            .chunks_exact(DESCRIPTOR_COUNT)
            .map(|chunk| {
                let mut frame = [0.0; DESCRIPTOR_COUNT];
                frame.copy_from_slice(chunk);
                frame
            })
            .collect();
        Some(Self { frames })
    }

    /// A feature set of `len` frames with every value set to zero.
    pub fn zeros(len: usize) -> Self {
        Self {
            frames: vec![[0.0; DESCRIPTOR_COUNT]; len],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Values of a single descriptor column.
    pub fn column(&self, descriptor: Descriptor) -> impl Iterator<Item = f32> + '_ {
        let col = descriptor.index();
        self.frames.iter().map(move |frame| frame[col])
    }

    /// Frames `[start_frame, start_frame + len)`, or `None` if out of range.
    pub fn window(&self, start_frame: usize, len: usize) -> Option<FeatureWindow<'_>> {
        let end = start_frame.checked_add(len)?;
        let frames = self.frames.get(start_frame..end)?;
        Some(FeatureWindow {
            start_frame,
            frames,
        })
    }

    /// Keep at most `len` frames.
    pub fn truncate(&mut self, len: usize) {
        self.frames.truncate(len);
    }

    /// Row-major `[frames, DESCRIPTOR_COUNT]` copy.
    pub fn to_flat(&self) -> Vec<f32> {
        self.frames.iter().flatten().copied().collect()
    }
}

/// Borrowed contiguous run of frames handed to the model.
#[derive(Debug, Clone, Copy)]
pub struct FeatureWindow<'a> {
    start_frame: usize,
    frames: &'a [Frame],
}

impl<'a> FeatureWindow<'a> {
    /// Wrap frames that are not part of a stored feature set (e.g. warm-up input).
    pub fn from_frames(start_frame: usize, frames: &'a [Frame]) -> Self {
        Self {
            start_frame,
            frames,
        }
    }

    #[inline]
    pub fn start_frame(&self) -> usize {
        self.start_frame
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn frames(&self) -> &'a [Frame] {
        self.frames
    }

    /// Flat tensor shape: `[frames, DESCRIPTOR_COUNT]`.
    #[inline]
    pub fn shape(&self) -> [usize; 2] {
        [self.frames.len(), DESCRIPTOR_COUNT]
    }

    /// Row-major copy for backends that consume flat tensors.
    pub fn to_flat(&self) -> Vec<f32> {
        self.frames.iter().flatten().copied().collect()
    }
}
