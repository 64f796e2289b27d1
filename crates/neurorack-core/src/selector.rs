//! Feature selection: which conditioning features the pipeline should generate from.

use crate::features::ConditioningFeatures;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identifier of a loaded audio source.
pub type SourceId = String;

/// Weighted combination of loaded sources.
///
/// Weights are normalised to sum to 1 unless `normalize` is turned off.
/// With `require_blend`, at least two sources must carry non-zero weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blend {
    pub weights: Vec<(SourceId, f32)>,
    #[serde(default = "default_normalize")]
    pub normalize: bool,
    #[serde(default)]
    pub require_blend: bool,
}

fn default_normalize() -> bool {
    true
}

impl Blend {
    pub fn new() -> Self {
        Self {
            weights: Vec::new(),
            normalize: true,
            require_blend: false,
        }
    }

    /// Degenerate blend selecting one source.
    pub fn single(source: impl Into<SourceId>) -> Self {
        Self::new().with(source, 1.0)
    }

    pub fn with(mut self, source: impl Into<SourceId>, weight: f32) -> Self {
        self.weights.push((source.into(), weight));
        self
    }

    /// Use weights as given, without renormalising.
    pub fn unnormalized(mut self) -> Self {
        self.normalize = false;
        self
    }

    /// Reject blends with fewer than two non-zero weights.
    pub fn strict(mut self) -> Self {
        self.require_blend = true;
        self
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.weights.iter().map(|(id, _)| id.as_str())
    }
}

impl Default for Blend {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Into<SourceId>> FromIterator<(S, f32)> for Blend {
    fn from_iter<I: IntoIterator<Item = (S, f32)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Blend::new(), |blend, (id, w)| blend.with(id, w))
    }
}

/// What a pipeline restart should generate from.
#[derive(Debug, Clone)]
pub enum FeatureSelector {
    /// Whatever the feature provider currently holds as active.
    Active,
    Source(SourceId),
    Blend(Blend),
    /// An explicit, already-computed feature set.
    Features(Arc<ConditioningFeatures>),
}

impl From<Arc<ConditioningFeatures>> for FeatureSelector {
    fn from(features: Arc<ConditioningFeatures>) -> Self {
        FeatureSelector::Features(features)
    }
}

impl From<Blend> for FeatureSelector {
    fn from(blend: Blend) -> Self {
        FeatureSelector::Blend(blend)
    }
}

/// Resolves selectors to concrete feature sets.
///
/// Implemented by the feature store; consulted by the generation worker on
/// every restart. Called off the audio thread only.
pub trait FeatureProvider: Send + Sync {
    fn resolve(&self, selector: &FeatureSelector) -> Result<Arc<ConditioningFeatures>>;
}

/// Provider backed by a single fixed feature set.
#[derive(Debug, Clone)]
pub struct StaticFeatures(pub Arc<ConditioningFeatures>);

impl FeatureProvider for StaticFeatures {
    fn resolve(&self, selector: &FeatureSelector) -> Result<Arc<ConditioningFeatures>> {
        match selector {
            FeatureSelector::Features(features) => Ok(Arc::clone(features)),
            FeatureSelector::Active => Ok(Arc::clone(&self.0)),
            other => Err(crate::Error::FeatureResolution(format!(
                "static provider cannot resolve {:?}",
                other
            ))),
        }
    }
}
