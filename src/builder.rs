//! Builder for configuring and constructing a `Neurorack`.

use crate::{Neurorack, Result};
use neurorack_core::{
    ConditioningFeatures, FeatureProvider, FeatureSelector, GenerativeModel, RackConfig, SourceId,
};
use neurorack_features::FeatureStore;
use neurorack_stream::StreamingPipeline;
use std::path::PathBuf;
use std::sync::Arc;

/// Configured sources are extracted (or read from the feature cache) during
/// `build()`, so decoding problems surface before any audio is generated.
///
/// The first epoch generates from `initial_source` if set, otherwise from the
/// first configured source, otherwise from the first source added with
/// `.source()`. With no sources at all the pipeline idles until a control
/// event selects one.
///
/// # Example
///
/// ```ignore
/// use neurorack::prelude::*;
///
/// let rack = Neurorack::builder()
///     .config_file("rack.toml")
///     .model(my_model)
///     .initial_source("bell")
///     .build()?;
///
/// rack.blend(Blend::new().with("bell", 0.3).with("drone", 0.7))?;
/// ```
pub struct NeurorackBuilder {
    config: RackConfig,
    config_path: Option<PathBuf>,
    model: Option<Box<dyn GenerativeModel>>,
    sources: Vec<(SourceId, ConditioningFeatures)>,
    initial_source: Option<SourceId>,
}

impl Default for NeurorackBuilder {
    fn default() -> Self {
        Self {
            config: RackConfig::default(),
            config_path: None,
            model: None,
            sources: Vec::new(),
            initial_source: None,
        }
    }
}

impl NeurorackBuilder {
    pub fn config(mut self, config: RackConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a TOML file at build time. Overrides `.config()`.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn model(mut self, model: impl GenerativeModel + 'static) -> Self {
        self.model = Some(Box::new(model));
        self
    }

    /// Register pre-extracted features under `id`.
    pub fn source(mut self, id: impl Into<SourceId>, features: ConditioningFeatures) -> Self {
        self.sources.push((id.into(), features));
        self
    }

    pub fn initial_source(mut self, id: impl Into<SourceId>) -> Self {
        self.initial_source = Some(id.into());
        self
    }

    pub fn build(self) -> Result<Neurorack> {
        let config = match &self.config_path {
            Some(path) => RackConfig::load(path)?,
            None => self.config,
        };
        config.validate()?;

        let model = self.model.ok_or_else(|| {
            neurorack_core::Error::InvalidConfig("a generative model is required".into())
        })?;

        let store = Arc::new(FeatureStore::new(config.features.clone())?);
        store.load_all()?;

        let mut first_added = None;
        for (id, features) in self.sources {
            first_added.get_or_insert_with(|| id.clone());
            store.insert(id, features);
        }

        let initial = self
            .initial_source
            .or_else(|| config.features.sources.first().map(|s| s.id.clone()))
            .or(first_added);
        match &initial {
            Some(id) => {
                store.select(id)?;
            }
            None => tracing::info!("No feature sources loaded, pipeline starts idle"),
        }

        let provider: Arc<dyn FeatureProvider> = store.clone();
        let pipeline = StreamingPipeline::builder()
            .config(config.stream)
            .boxed_model(model)
            .provider(provider)
            .initial_selector(FeatureSelector::Active)
            .build()?;

        tracing::info!(
            "Neurorack ready with {} source(s), initial '{}'",
            store.source_ids().len(),
            initial.as_deref().unwrap_or("-")
        );

        Ok(Neurorack::from_parts(config, store, pipeline))
    }
}
