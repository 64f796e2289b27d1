//! Control events and control-voltage mapping.
//!
//! Panel and CV inputs arrive as [`ControlEvent`]s; the helpers here turn raw
//! voltages into blends and morphs the feature store understands.

use neurorack_core::{Blend, Descriptor, SourceId};
use neurorack_features::Morph;

/// Bipolar CV input range in volts.
pub const CV_MIN_VOLTS: f32 = -4.0;
pub const CV_MAX_VOLTS: f32 = 4.0;

/// A user or CV action that changes what the instrument generates.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    /// Generate from a single loaded source.
    SelectSource(SourceId),
    Blend(Blend),
    Morph(Morph),
    /// Start over from frame 0 with the current feature set.
    Restart,
}

impl From<Blend> for ControlEvent {
    fn from(blend: Blend) -> Self {
        ControlEvent::Blend(blend)
    }
}

impl From<Morph> for ControlEvent {
    fn from(morph: Morph) -> Self {
        ControlEvent::Morph(morph)
    }
}

/// Map -4..+4 V to 0..1, clamped. Non-finite input maps to 0.
#[inline]
pub fn cv_to_unit(volts: f32) -> f32 {
    if !volts.is_finite() {
        return 0.0;
    }
    ((volts - CV_MIN_VOLTS) / (CV_MAX_VOLTS - CV_MIN_VOLTS)).clamp(0.0, 1.0)
}

/// One CV channel per source; each channel's level becomes that source's
/// weight.
///
/// Channels beyond the shorter of the two slices are ignored. The blend is
/// normalised, so if every channel sits at the bottom of its range the store
/// rejects it as all-zero.
pub fn cv_blend<S: AsRef<str>>(sources: &[S], volts: &[f32]) -> Blend {
    sources
        .iter()
        .zip(volts)
        .map(|(id, v)| (id.as_ref().to_string(), cv_to_unit(*v)))
        .collect()
}

/// Two-source crossfade driven by one CV, with extra gain CVs on roll-off,
/// flatness and bandwidth.
///
/// Gain CVs map to 0..2, so 0 V leaves a descriptor untouched.
pub fn cv_crossfade(
    from: impl Into<SourceId>,
    to: impl Into<SourceId>,
    control: f32,
    gains: [f32; 3],
) -> Morph {
    let [rolloff, flatness, bandwidth] = gains;
    Morph::new(from, to, cv_to_unit(control))
        .with_gain(Descriptor::SpectralRolloff, 2.0 * cv_to_unit(rolloff))
        .with_gain(Descriptor::SpectralFlatness, 2.0 * cv_to_unit(flatness))
        .with_gain(Descriptor::SpectralBandwidth, 2.0 * cv_to_unit(bandwidth))
}

/// Independent morph amounts for loudness, flatness, centroid and pitch.
///
/// Descriptors without a CV stay on `from`.
pub fn cv_descriptor_morph(
    from: impl Into<SourceId>,
    to: impl Into<SourceId>,
    volts: [f32; 4],
) -> Morph {
    let [loudness, flatness, centroid, pitch] = volts;
    Morph::new(from, to, 0.0)
        .with_alpha(Descriptor::Loudness, cv_to_unit(loudness))
        .with_alpha(Descriptor::SpectralFlatness, cv_to_unit(flatness))
        .with_alpha(Descriptor::SpectralCentroid, cv_to_unit(centroid))
        .with_alpha(Descriptor::Pitch, cv_to_unit(pitch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_cv_to_unit_range() {
        assert_eq!(cv_to_unit(-4.0), 0.0);
        assert_eq!(cv_to_unit(0.0), 0.5);
        assert_eq!(cv_to_unit(4.0), 1.0);
        assert_eq!(cv_to_unit(-10.0), 0.0);
        assert_eq!(cv_to_unit(12.0), 1.0);
        assert_eq!(cv_to_unit(f32::NAN), 0.0);
        assert_abs_diff_eq!(cv_to_unit(2.0), 0.75);
    }

    #[test]
    fn test_cv_blend_weights() {
        let blend = cv_blend(&["a", "b", "c"], &[4.0, 0.0]);
        assert_eq!(
            blend.weights,
            vec![("a".to_string(), 1.0), ("b".to_string(), 0.5)]
        );
        assert!(blend.normalize);
    }

    #[test]
    fn test_cv_crossfade() {
        let morph = cv_crossfade("a", "b", 0.0, [0.0, 4.0, -4.0]);
        assert_eq!(morph.alpha, [0.5; 7]);
        assert_eq!(morph.gain[Descriptor::Loudness.index()], 1.0);
        assert_eq!(morph.gain[Descriptor::SpectralRolloff.index()], 1.0);
        assert_eq!(morph.gain[Descriptor::SpectralFlatness.index()], 2.0);
        assert_eq!(morph.gain[Descriptor::SpectralBandwidth.index()], 0.0);
        assert!(morph.validate().is_ok());
    }

    #[test]
    fn test_cv_descriptor_morph() {
        let morph = cv_descriptor_morph("a", "b", [4.0, -4.0, 0.0, 2.0]);
        assert_eq!(morph.alpha[Descriptor::Loudness.index()], 1.0);
        assert_eq!(morph.alpha[Descriptor::SpectralFlatness.index()], 0.0);
        assert_eq!(morph.alpha[Descriptor::SpectralCentroid.index()], 0.5);
        assert_abs_diff_eq!(morph.alpha[Descriptor::Pitch.index()], 0.75);
        assert_eq!(morph.alpha[Descriptor::ZeroCrossingRate.index()], 0.0);
        assert_eq!(morph.gain, [1.0; 7]);
    }
}
