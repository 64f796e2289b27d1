//! Streaming pipeline: owns the worker thread and hands out request handles.

use crate::command::PipelineCommand;
use crate::generator::BlockGenerator;
use crate::handle::BlockRequestHandle;
use crate::metrics::{PipelineMetrics, PipelineMetricsSnapshot};
use crate::queue::BlockQueue;
use crate::state::{PipelineState, SharedPipelineState};
use crate::worker::GenerationWorker;
use crate::Result;
use crossbeam_channel::{bounded, Sender};
use neurorack_core::{
    BlockResponse, ConditioningFeatures, FeatureProvider, FeatureSelector, GenerativeModel,
    StaticFeatures, StreamConfig,
};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thread_priority::ThreadPriority;

const DEFAULT_THREAD_NAME: &str = "neurorack-gen";

/// Builder for [`StreamingPipeline`].
///
/// # Example
///
/// ```ignore
/// let pipeline = StreamingPipeline::builder()
///     .config(StreamConfig::default())
///     .model(my_model)
///     .provider(store.clone())
///     .build()?;
/// ```
pub struct StreamingPipelineBuilder {
    config: StreamConfig,
    model: Option<Box<dyn GenerativeModel>>,
    provider: Option<Arc<dyn FeatureProvider>>,
    initial: Option<FeatureSelector>,
    thread_name: String,
}

impl Default for StreamingPipelineBuilder {
    fn default() -> Self {
        Self {
            config: StreamConfig::default(),
            model: None,
            provider: None,
            initial: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl StreamingPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    pub fn model(mut self, model: impl GenerativeModel + 'static) -> Self {
        self.model = Some(Box::new(model));
        self
    }

    pub fn boxed_model(mut self, model: Box<dyn GenerativeModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Where restarts resolve their selectors.
    pub fn provider(mut self, provider: Arc<dyn FeatureProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Generate from one fixed feature set.
    pub fn features(mut self, features: Arc<ConditioningFeatures>) -> Self {
        self.provider = Some(Arc::new(StaticFeatures(features)));
        self
    }

    /// Selector for the first epoch. Defaults to the provider's active set.
    pub fn initial_selector(mut self, selector: impl Into<FeatureSelector>) -> Self {
        self.initial = Some(selector.into());
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Validate, warm up the model and start the worker thread.
    pub fn build(self) -> Result<StreamingPipeline> {
        self.config.validate()?;
        let model = self.model.ok_or_else(|| {
            neurorack_core::Error::InvalidConfig("pipeline requires a generative model".into())
        })?;
        let provider = self.provider.ok_or_else(|| {
            neurorack_core::Error::InvalidConfig("pipeline requires a feature provider".into())
        })?;

        let config = self.config;
        let mut generator = BlockGenerator::new(model, &config);
        generator.warm_up(config.window_frames(), config.warmup_passes)?;

        let shared = Arc::new(SharedPipelineState::new());
        let queue = Arc::new(BlockQueue::new(config.ring_capacity()));
        let metrics = Arc::new(PipelineMetrics::new());
        let (command_tx, command_rx) = bounded(config.command_capacity);
        let (wake_tx, wake_rx) = bounded(1);

        let worker = GenerationWorker::new(
            generator,
            provider,
            Arc::clone(&shared),
            Arc::clone(&queue),
            Arc::clone(&metrics),
            command_rx,
            wake_rx,
            &config,
        );

        let thread = thread::Builder::new()
            .name(self.thread_name)
            .spawn(move || {
                let _ = thread_priority::set_current_thread_priority(ThreadPriority::Max);
                worker.run();
            })?;

        let handle = BlockRequestHandle::new(
            shared,
            queue,
            Arc::clone(&metrics),
            command_tx.clone(),
            wake_tx,
            config.block_size,
            config.lookahead_blocks,
        );

        let pipeline = StreamingPipeline {
            handle,
            metrics,
            command_tx,
            thread: Some(thread),
            config,
        };
        pipeline
            .handle
            .notify_restart(self.initial.unwrap_or(FeatureSelector::Active))?;

        tracing::info!(
            "Streaming pipeline started: {} blocks of {} samples per window, ring of {}",
            config.blocks_per_window,
            config.block_size,
            config.ring_capacity()
        );
        Ok(pipeline)
    }
}

/// Background block generation with an RT-safe request API.
///
/// Dropping the pipeline stops the worker and joins its thread.
pub struct StreamingPipeline {
    handle: BlockRequestHandle,
    metrics: Arc<PipelineMetrics>,
    command_tx: Sender<PipelineCommand>,
    thread: Option<JoinHandle<()>>,
    config: StreamConfig,
}

impl StreamingPipeline {
    pub fn builder() -> StreamingPipelineBuilder {
        StreamingPipelineBuilder::new()
    }

    /// Cloneable handle for the audio thread.
    pub fn handle(&self) -> BlockRequestHandle {
        self.handle.clone()
    }

    #[inline]
    pub fn request_block(&self, index: u64) -> BlockResponse {
        self.handle.request_block(index)
    }

    pub fn notify_restart(&self, selector: impl Into<FeatureSelector>) -> Result<()> {
        self.handle.notify_restart(selector.into())
    }

    pub fn state(&self) -> PipelineState {
        self.handle.state()
    }

    pub fn epoch(&self) -> u64 {
        self.handle.epoch()
    }

    pub fn metrics(&self) -> PipelineMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the worker and wait for it to exit. Further restarts fail with
    /// [`Error::PipelineStopped`](crate::Error::PipelineStopped).
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.command_tx.send(PipelineCommand::Shutdown);
        if thread.join().is_err() {
            tracing::error!("Generation worker panicked");
        }
    }
}

impl Drop for StreamingPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for StreamingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingPipeline")
            .field("state", &self.state())
            .field("epoch", &self.epoch())
            .field("running", &self.is_running())
            .finish()
    }
}
