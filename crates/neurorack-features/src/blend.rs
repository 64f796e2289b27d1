//! Combining feature sets: weighted blends and per-descriptor morphs.

use crate::{Error, Result};
use neurorack_core::{Blend, ConditioningFeatures, Descriptor, Frame, SourceId, DESCRIPTOR_COUNT};
use serde::{Deserialize, Serialize};

/// Validate blend weights and return the effective `(source, weight)` pairs.
///
/// Zero-weight entries are dropped. Weights are divided by their sum when the
/// blend asks for normalisation.
pub fn effective_weights(blend: &Blend) -> Result<Vec<(&str, f32)>> {
    if blend.weights.is_empty() {
        return Err(Error::InvalidWeights("blend lists no sources".into()));
    }

    for (i, (id, weight)) in blend.weights.iter().enumerate() {
        if !weight.is_finite() || *weight < 0.0 {
            return Err(Error::InvalidWeights(format!(
                "weight {} for '{}' must be finite and non-negative",
                weight, id
            )));
        }
        if blend.weights[..i].iter().any(|(other, _)| other == id) {
            return Err(Error::InvalidWeights(format!("source '{}' listed twice", id)));
        }
    }

    let active: Vec<(&str, f32)> = blend
        .weights
        .iter()
        .filter(|(_, w)| *w > 0.0)
        .map(|(id, w)| (id.as_str(), *w))
        .collect();

    if active.is_empty() {
        return Err(Error::InvalidWeights("all weights are zero".into()));
    }
    if blend.require_blend && active.len() < 2 {
        return Err(Error::InvalidWeights(format!(
            "blend needs at least two non-zero weights, got {}",
            active.len()
        )));
    }

    if !blend.normalize {
        return Ok(active);
    }
    let sum: f32 = active.iter().map(|(_, w)| w).sum();
    Ok(active.into_iter().map(|(id, w)| (id, w / sum)).collect())
}

/// Frame-wise weighted sum, truncated to the shortest input.
pub fn weighted_sum(inputs: &[(&ConditioningFeatures, f32)]) -> ConditioningFeatures {
    let len = inputs.iter().map(|(f, _)| f.len()).min().unwrap_or(0);
    let frames = (0..len)
        .map(|t| {
            let mut out: Frame = [0.0; DESCRIPTOR_COUNT];
            for (features, weight) in inputs {
                let frame = &features.frames()[t];
                for (o, v) in out.iter_mut().zip(frame) {
                    *o += weight * v;
                }
            }
            out
        })
        .collect();
    ConditioningFeatures::new(frames)
}

/// Two-source interpolation with an independent amount per descriptor,
/// followed by a per-descriptor gain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Morph {
    pub from: SourceId,
    pub to: SourceId,
    /// 0.0 = all `from`, 1.0 = all `to`
    pub alpha: [f32; DESCRIPTOR_COUNT],
    pub gain: [f32; DESCRIPTOR_COUNT],
}

impl Morph {
    /// Morph every descriptor by the same amount.
    pub fn new(from: impl Into<SourceId>, to: impl Into<SourceId>, alpha: f32) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            alpha: [alpha; DESCRIPTOR_COUNT],
            gain: [1.0; DESCRIPTOR_COUNT],
        }
    }

    pub fn with_alpha(mut self, descriptor: Descriptor, alpha: f32) -> Self {
        self.alpha[descriptor.index()] = alpha;
        self
    }

    pub fn with_gain(mut self, descriptor: Descriptor, gain: f32) -> Self {
        self.gain[descriptor.index()] = gain;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for d in Descriptor::ALL {
            let alpha = self.alpha[d.index()];
            if !(0.0..=1.0).contains(&alpha) {
                return Err(Error::InvalidWeights(format!(
                    "{} morph amount {} outside 0..1",
                    d.name(),
                    alpha
                )));
            }
            let gain = self.gain[d.index()];
            if !gain.is_finite() || gain < 0.0 {
                return Err(Error::InvalidWeights(format!(
                    "{} gain {} must be finite and non-negative",
                    d.name(),
                    gain
                )));
            }
        }
        Ok(())
    }

    /// Truncated to the shorter input.
    pub fn apply(&self, from: &ConditioningFeatures, to: &ConditioningFeatures) -> ConditioningFeatures {
        let frames = from
            .frames()
            .iter()
            .zip(to.frames())
            .map(|(a, b)| {
                let mut out: Frame = [0.0; DESCRIPTOR_COUNT];
                for d in 0..DESCRIPTOR_COUNT {
                    let alpha = self.alpha[d];
                    out[d] = ((1.0 - alpha) * a[d] + alpha * b[d]) * self.gain[d];
                }
                out
            })
            .collect();
        ConditioningFeatures::new(frames)
    }
}
