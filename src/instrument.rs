//! The instrument: a feature store and a streaming pipeline wired together.

use crate::control::ControlEvent;
use crate::{NeurorackBuilder, Result};
use neurorack_core::{
    Blend, BlockResponse, ConditioningFeatures, FeatureSelector, RackConfig, SourceId,
};
use neurorack_features::{FeatureStore, Morph};
use neurorack_stream::{
    BlockPlayer, BlockRequestHandle, PipelineMetricsSnapshot, PipelineState, StreamingPipeline,
};
use std::sync::Arc;

/// Neural generative instrument.
///
/// Control methods validate against the feature store on the calling thread,
/// so invalid weights or unknown sources are reported immediately and leave
/// the active feature set unchanged. On success they request a pipeline
/// restart and return without waiting for it. A restart that cannot be
/// queued also leaves the active set unchanged.
pub struct Neurorack {
    config: RackConfig,
    store: Arc<FeatureStore>,
    pipeline: StreamingPipeline,
}

impl Neurorack {
    pub fn builder() -> NeurorackBuilder {
        NeurorackBuilder::default()
    }

    pub(crate) fn from_parts(
        config: RackConfig,
        store: Arc<FeatureStore>,
        pipeline: StreamingPipeline,
    ) -> Self {
        Self {
            config,
            store,
            pipeline,
        }
    }

    pub fn handle_control(&self, event: ControlEvent) -> Result<()> {
        match event {
            ControlEvent::SelectSource(id) => self.select_source(&id),
            ControlEvent::Blend(blend) => self.blend(&blend),
            ControlEvent::Morph(morph) => self.morph(&morph),
            ControlEvent::Restart => self.restart(),
        }
    }

    pub fn select_source(&self, id: &str) -> Result<()> {
        self.apply(|store| store.select(id))
    }

    pub fn blend(&self, blend: &Blend) -> Result<()> {
        self.apply(|store| store.interpolate(blend))
    }

    pub fn morph(&self, morph: &Morph) -> Result<()> {
        self.apply(|store| store.morph(morph))
    }

    /// Change the active set, then restart. If the restart cannot be
    /// queued the previous active set is put back.
    fn apply<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&FeatureStore) -> neurorack_features::Result<Arc<ConditioningFeatures>>,
    {
        let previous = self.store.active();
        change(&self.store)?;
        if let Err(e) = self.restart() {
            tracing::warn!("Restart not queued, keeping previous features: {}", e);
            self.store.set_active(previous);
            return Err(e);
        }
        Ok(())
    }

    /// Regenerate from frame 0 with the active feature set.
    pub fn restart(&self) -> Result<()> {
        self.pipeline.notify_restart(FeatureSelector::Active)?;
        Ok(())
    }

    /// Load another source from disk at runtime. Does not change the active set.
    pub fn load_source(&self, id: &str, path: impl AsRef<std::path::Path>) -> Result<()> {
        self.store.load_file(id, path.as_ref())?;
        Ok(())
    }

    #[inline]
    pub fn request_block(&self, index: u64) -> BlockResponse {
        self.pipeline.request_block(index)
    }

    /// Cloneable, RT-safe handle for the audio thread.
    pub fn handle(&self) -> BlockRequestHandle {
        self.pipeline.handle()
    }

    pub fn player(&self) -> BlockPlayer {
        BlockPlayer::new(self.pipeline.handle())
    }

    pub fn features(&self) -> &Arc<FeatureStore> {
        &self.store
    }

    pub fn active_features(&self) -> Option<Arc<ConditioningFeatures>> {
        self.store.active()
    }

    pub fn source_ids(&self) -> Vec<SourceId> {
        self.store.source_ids()
    }

    pub fn state(&self) -> PipelineState {
        self.pipeline.state()
    }

    pub fn epoch(&self) -> u64 {
        self.pipeline.epoch()
    }

    pub fn metrics(&self) -> PipelineMetricsSnapshot {
        self.pipeline.metrics()
    }

    pub fn config(&self) -> &RackConfig {
        &self.config
    }

    /// Stop generation. Blocks already handed out stay valid.
    pub fn shutdown(&mut self) {
        self.pipeline.stop();
    }
}

impl std::fmt::Debug for Neurorack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neurorack")
            .field("sources", &self.store.source_ids())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
