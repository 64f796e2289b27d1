//! Linear crossfade across model window boundaries.

/// Precomputed complementary ramps.
///
/// `fade_out` runs 1.0 -> 0.0 and `fade_in` runs 0.0 -> 1.0, both with the
/// endpoints included, so the first blended sample is pure tail and the last
/// is pure head. `fade_out[i] + fade_in[i] == 1` for every `i`.
#[derive(Debug, Clone)]
pub struct LinearCrossfade {
    fade_out: Vec<f32>,
    fade_in: Vec<f32>,
}

impl LinearCrossfade {
    pub fn new(len: usize) -> Self {
        let fade_in: Vec<f32> = match len {
            0 => Vec::new(),
            1 => vec![0.0],
            _ => (0..len).map(|i| i as f32 / (len - 1) as f32).collect(),
        };
        let fade_out = fade_in.iter().map(|w| 1.0 - w).collect();
        Self { fade_out, fade_in }
    }

    pub fn len(&self) -> usize {
        self.fade_in.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fade_in.is_empty()
    }

    pub fn fade_out(&self) -> &[f32] {
        &self.fade_out
    }

    pub fn fade_in(&self) -> &[f32] {
        &self.fade_in
    }

    /// Blend `tail` into the start of `head` in place.
    ///
    /// Only the first `len()` samples are touched; shorter inputs blend over
    /// their common length.
    pub fn apply(&self, tail: &[f32], head: &mut [f32]) {
        for (((h, &t), &out), &inp) in head
            .iter_mut()
            .zip(tail)
            .zip(&self.fade_out)
            .zip(&self.fade_in)
        {
            *h = t * out + *h * inp;
        }
    }
}
