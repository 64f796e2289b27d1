//! Feature store: source loading, caching and the active feature set.
//!
//! Sources are loaded once and kept in memory; with a cache directory they
//! also survive restarts of the process. Every successful blend or morph
//! replaces the active feature set atomically, so readers (the generation
//! worker) always see either the old or the new set, never a mix.

use crate::blend::{effective_weights, weighted_sum, Morph};
use crate::cache::FeatureCache;
use crate::decode::decode_mono;
use crate::extract::FeatureExtractor;
use crate::{Error, Result};
use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use neurorack_core::{
    Blend, ConditioningFeatures, FeatureConfig, FeatureProvider, FeatureSelector, SourceId,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

pub struct FeatureStore {
    config: FeatureConfig,
    sources: DashMap<SourceId, Arc<ConditioningFeatures>>,
    active: ArcSwapOption<ConditioningFeatures>,
    extractor: Mutex<FeatureExtractor>,
    cache: Option<FeatureCache>,
}

impl FeatureStore {
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate()?;
        let cache = match &config.cache_dir {
            Some(dir) => Some(FeatureCache::new(dir, &config)?),
            None => None,
        };

        Ok(Self {
            extractor: Mutex::new(FeatureExtractor::new(&config)),
            config,
            sources: DashMap::new(),
            active: ArcSwapOption::from(None),
            cache,
        })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Load a configured source.
    pub fn load(&self, source_id: &str) -> Result<Arc<ConditioningFeatures>> {
        if let Some(features) = self.get(source_id) {
            return Ok(features);
        }
        let path = self
            .config
            .source_path(source_id)
            .ok_or_else(|| Error::UnknownSource(source_id.to_string()))?
            .to_path_buf();
        self.load_file(source_id, &path)
    }

    /// Load every configured source. Fails on the first source that cannot be extracted.
    pub fn load_all(&self) -> Result<()> {
        for source in &self.config.sources {
            self.load(&source.id)?;
        }
        Ok(())
    }

    /// Load `path` under `source_id`: memory, then disk cache, then extraction.
    pub fn load_file(&self, source_id: &str, path: &Path) -> Result<Arc<ConditioningFeatures>> {
        if let Some(features) = self.get(source_id) {
            return Ok(features);
        }

        if let Some(cache) = &self.cache {
            if let Some(features) = cache.load(source_id, path) {
                tracing::debug!("Feature cache hit for '{}' ({} frames)", source_id, features.len());
                return Ok(self.insert(source_id, features));
            }
            tracing::debug!("Feature cache miss for '{}'", source_id);
        }

        let start = Instant::now();
        let samples = decode_mono(path, self.config.sample_rate)
            .map_err(|e| Error::extraction(source_id, e))?;
        let features = self.extractor.lock().extract(&samples);
        if features.is_empty() {
            return Err(Error::extraction(
                source_id,
                format!("{} samples is too short for one frame", samples.len()),
            ));
        }

        tracing::info!(
            "Extracted {} frames for '{}' from {} in {:.1} ms",
            features.len(),
            source_id,
            path.display(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store(source_id, path, &features) {
                tracing::warn!("Failed to persist features for '{}': {}", source_id, e);
            }
        }

        Ok(self.insert(source_id, features))
    }

    /// Register pre-extracted features, replacing any previous entry.
    pub fn insert(
        &self,
        source_id: impl Into<SourceId>,
        features: ConditioningFeatures,
    ) -> Arc<ConditioningFeatures> {
        let features = Arc::new(features);
        self.sources.insert(source_id.into(), Arc::clone(&features));
        features
    }

    pub fn get(&self, source_id: &str) -> Option<Arc<ConditioningFeatures>> {
        self.sources.get(source_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.sources.contains_key(source_id)
    }

    /// Loaded source ids, sorted.
    pub fn source_ids(&self) -> Vec<SourceId> {
        let mut ids: Vec<SourceId> = self.sources.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Current active feature set, if any blend or morph has succeeded yet.
    pub fn active(&self) -> Option<Arc<ConditioningFeatures>> {
        self.active.load_full()
    }

    /// Replace the active feature set directly, e.g. to restore an earlier one.
    pub fn set_active(&self, features: Option<Arc<ConditioningFeatures>>) {
        self.active.store(features);
    }

    /// Compute a blend and make it the active feature set.
    ///
    /// On error the active set is left unchanged.
    pub fn interpolate(&self, blend: &Blend) -> Result<Arc<ConditioningFeatures>> {
        let features = Arc::new(self.compute_blend(blend)?);
        self.active.store(Some(Arc::clone(&features)));
        tracing::debug!("Active features: blend of {:?} ({} frames)", blend.weights, features.len());
        Ok(features)
    }

    /// Make a single source the active feature set.
    pub fn select(&self, source_id: &str) -> Result<Arc<ConditioningFeatures>> {
        self.interpolate(&Blend::single(source_id))
    }

    /// Compute a morph and make it the active feature set.
    pub fn morph(&self, morph: &Morph) -> Result<Arc<ConditioningFeatures>> {
        morph.validate()?;
        let from = self.require(&morph.from)?;
        let to = self.require(&morph.to)?;
        let features = Arc::new(morph.apply(&from, &to));
        self.active.store(Some(Arc::clone(&features)));
        tracing::debug!(
            "Active features: morph '{}' -> '{}' ({} frames)",
            morph.from,
            morph.to,
            features.len()
        );
        Ok(features)
    }

    /// Blend without touching the active set.
    ///
    /// The result is as long as the shortest listed source, zero-weight
    /// entries included; those contribute no values.
    pub fn compute_blend(&self, blend: &Blend) -> Result<ConditioningFeatures> {
        let weights = effective_weights(blend)?;
        let listed = blend
            .sources()
            .map(|id| self.require(id))
            .collect::<Result<Vec<_>>>()?;
        let len = listed.iter().map(|f| f.len()).min().unwrap_or(0);

        let inputs = weights
            .iter()
            .map(|(id, w)| Ok((self.require(id)?, *w)))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<(&ConditioningFeatures, f32)> =
            inputs.iter().map(|(f, w)| (f.as_ref(), *w)).collect();

        let mut out = weighted_sum(&refs);
        out.truncate(len);
        Ok(out)
    }

    fn require(&self, source_id: &str) -> Result<Arc<ConditioningFeatures>> {
        self.get(source_id)
            .ok_or_else(|| Error::UnknownSource(source_id.to_string()))
    }
}

impl FeatureProvider for FeatureStore {
    fn resolve(&self, selector: &FeatureSelector) -> neurorack_core::Result<Arc<ConditioningFeatures>> {
        let resolved = match selector {
            FeatureSelector::Active => self
                .active()
                .ok_or(Error::NoActiveFeatures),
            FeatureSelector::Source(id) => self.select(id),
            FeatureSelector::Blend(blend) => self.interpolate(blend),
            FeatureSelector::Features(features) => {
                self.active.store(Some(Arc::clone(features)));
                Ok(Arc::clone(features))
            }
        };
        resolved.map_err(|e| neurorack_core::Error::FeatureResolution(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurorack_core::{SourceConfig, DESCRIPTOR_COUNT};

    fn ramp(offset: f32, len: usize) -> ConditioningFeatures {
        ConditioningFeatures::new(
            (0..len)
                .map(|i| [offset + i as f32; DESCRIPTOR_COUNT])
                .collect(),
        )
    }

    fn write_sine(path: &Path, seconds: f32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..(22050.0 * seconds) as usize {
            let s = 0.5 * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 22050.0).sin();
            writer.write_sample((s * 32767.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn store() -> FeatureStore {
        let store = FeatureStore::new(FeatureConfig::default()).unwrap();
        store.insert("a", ramp(0.0, 300));
        store.insert("b", ramp(1000.0, 300));
        store
    }

    #[test]
    fn test_single_source_blend_is_exact() {
        let store = store();
        let out = store
            .interpolate(&Blend::new().with("a", 1.0).with("b", 0.0))
            .unwrap();
        assert_eq!(*out, *store.get("a").unwrap());
        assert!(Arc::ptr_eq(&out, &store.active().unwrap()));
    }

    #[test]
    fn test_even_blend() {
        let store = store();
        let out = store
            .interpolate(&Blend::new().with("a", 2.0).with("b", 2.0))
            .unwrap();
        assert_eq!(out.frame(0).unwrap()[0], 500.0);
        assert_eq!(out.frame(10).unwrap()[3], 510.0);
    }

    #[test]
    fn test_failed_blend_keeps_active() {
        let store = store();
        let before = store.select("a").unwrap();

        let err = store
            .interpolate(&Blend::new().with("a", 0.0).with("b", 0.0))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidWeights(_)));

        let err = store.interpolate(&Blend::single("missing")).unwrap_err();
        assert!(matches!(err, Error::UnknownSource(_)));

        assert!(Arc::ptr_eq(&before, &store.active().unwrap()));
    }

    #[test]
    fn test_blend_truncates_to_shortest_listed() {
        let store = store();
        store.insert("short", ramp(5.0, 40));
        let out = store
            .interpolate(&Blend::new().with("a", 1.0).with("short", 0.0))
            .unwrap();
        assert_eq!(out.len(), 40);
        assert_eq!(out.frames(), &store.get("a").unwrap().frames()[..40]);

        let err = store
            .interpolate(&Blend::new().with("a", 1.0).with("ghost", 0.0))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownSource(_)));
    }

    #[test]
    fn test_morph_sets_active() {
        let store = store();
        store.insert("short", ramp(0.0, 100));
        let out = store.morph(&Morph::new("a", "short", 0.0)).unwrap();
        assert_eq!(out.len(), 100);
        assert_eq!(store.active().unwrap().len(), 100);
    }

    #[test]
    fn test_provider_resolution() {
        let store = store();
        let provider: &dyn FeatureProvider = &store;

        assert!(provider.resolve(&FeatureSelector::Active).is_err());
        let b = provider.resolve(&FeatureSelector::Source("b".into())).unwrap();
        assert_eq!(b.frame(0).unwrap()[0], 1000.0);
        let active = provider.resolve(&FeatureSelector::Active).unwrap();
        assert!(Arc::ptr_eq(&active, &b));

        let err = provider
            .resolve(&FeatureSelector::Source("nope".into()))
            .unwrap_err();
        assert!(matches!(err, neurorack_core::Error::FeatureResolution(_)));
    }

    #[test]
    fn test_load_extracts_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("tone.wav");
        write_sine(&wav, 0.5);

        let config = FeatureConfig {
            cache_dir: Some(dir.path().join("cache")),
            sources: vec![SourceConfig {
                id: "tone".into(),
                path: wav.clone(),
            }],
            ..Default::default()
        };

        let first = FeatureStore::new(config.clone()).unwrap();
        let features = first.load("tone").unwrap();
        assert_eq!(features.len(), 11025 / 512);
        assert!(Arc::ptr_eq(&features, &first.load("tone").unwrap()));

        // A fresh store reads the cache even after the source file is gone.
        std::fs::remove_file(&wav).unwrap();
        let second = FeatureStore::new(config.clone()).unwrap();
        assert_eq!(*second.load("tone").unwrap(), *features);

        // Other analysis settings must not reuse those entries.
        let rehopped = FeatureStore::new(FeatureConfig {
            hop_size: 256,
            ..config
        })
        .unwrap();
        assert!(matches!(
            rehopped.load("tone"),
            Err(Error::FeatureExtraction { .. })
        ));
    }

    #[test]
    fn test_cache_follows_source_path() {
        let dir = tempfile::tempdir().unwrap();
        let old_wav = dir.path().join("old.wav");
        let new_wav = dir.path().join("new.wav");
        write_sine(&old_wav, 0.5);
        write_sine(&new_wav, 0.5);

        let config = FeatureConfig {
            cache_dir: Some(dir.path().join("cache")),
            ..Default::default()
        };
        let first = FeatureStore::new(config.clone()).unwrap();
        first.load_file("tone", &old_wav).unwrap();

        // Same id under a new path: the old cache entry is not served.
        std::fs::remove_file(&new_wav).unwrap();
        let second = FeatureStore::new(config).unwrap();
        assert!(matches!(
            second.load_file("tone", &new_wav),
            Err(Error::FeatureExtraction { .. })
        ));
        assert!(second.load_file("tone", &old_wav).is_ok());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = FeatureStore::new(FeatureConfig::default()).unwrap();

        assert!(matches!(store.load("unconfigured"), Err(Error::UnknownSource(_))));

        let missing = store.load_file("ghost", &dir.path().join("ghost.wav"));
        assert!(matches!(missing, Err(Error::FeatureExtraction { .. })));

        let tiny = dir.path().join("tiny.wav");
        write_sine(&tiny, 0.01);
        let err = store.load_file("tiny", &tiny).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }
}
