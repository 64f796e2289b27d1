//! Generation worker loop.
//!
//! Owns the model and the carried tail. Generates windows until the
//! lookahead target is met, then parks on the command channel and the
//! consumer doorbell until there is more to do.

use crate::command::PipelineCommand;
use crate::generator::BlockGenerator;
use crate::metrics::PipelineMetrics;
use crate::queue::BlockQueue;
use crate::state::{PipelineState, SharedPipelineState};
use crate::Error;
use crossbeam_channel::{select, Receiver, TryRecvError};
use neurorack_core::{
    AudioBlock, ConditioningFeatures, FeatureProvider, FeatureSelector, StreamConfig,
};
use std::sync::Arc;
use std::time::Duration;

/// What the loop should do after handling commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Restarted,
    Shutdown,
}

pub(crate) struct GenerationWorker {
    generator: BlockGenerator,
    provider: Arc<dyn FeatureProvider>,
    shared: Arc<SharedPipelineState>,
    queue: Arc<BlockQueue>,
    metrics: Arc<PipelineMetrics>,
    command_rx: Receiver<PipelineCommand>,
    wake_rx: Receiver<()>,
    blocks_per_window: usize,
    lookahead: u64,
    idle_wait: Duration,

    features: Option<Arc<ConditioningFeatures>>,
    tail: Option<Box<[f32]>>,
    next_frame: usize,
    next_index: u64,
    epoch: u64,
}

impl GenerationWorker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        generator: BlockGenerator,
        provider: Arc<dyn FeatureProvider>,
        shared: Arc<SharedPipelineState>,
        queue: Arc<BlockQueue>,
        metrics: Arc<PipelineMetrics>,
        command_rx: Receiver<PipelineCommand>,
        wake_rx: Receiver<()>,
        config: &StreamConfig,
    ) -> Self {
        let epoch = shared.epoch();
        Self {
            generator,
            provider,
            shared,
            queue,
            metrics,
            command_rx,
            wake_rx,
            blocks_per_window: config.blocks_per_window,
            lookahead: config.lookahead_blocks as u64,
            idle_wait: Duration::from_millis(config.idle_wait_ms),
            features: None,
            tail: None,
            next_frame: 0,
            next_index: 0,
            epoch,
        }
    }

    pub(crate) fn run(mut self) {
        tracing::debug!("Generation worker started for '{}'", self.generator.model_name());

        loop {
            if self.absorb(None) == Flow::Shutdown {
                break;
            }

            let flow = match self.shared.state() {
                PipelineState::FullGeneration => {
                    if self.below_target() {
                        self.step()
                    } else {
                        tracing::debug!(
                            "Lookahead filled at block {} (epoch {})",
                            self.next_index,
                            self.epoch
                        );
                        self.shared.set_state(PipelineState::SteadyState);
                        Flow::Continue
                    }
                }
                PipelineState::SteadyState if self.below_target() => self.step(),
                _ => self.park(),
            };

            if flow == Flow::Shutdown {
                break;
            }
        }

        tracing::debug!("Generation worker stopped");
    }

    /// Wait for a command, a doorbell ring or the idle timeout.
    fn park(&mut self) -> Flow {
        self.shared.clear_wake();
        // The consumer may have moved between the last check and the clear.
        if self.shared.state() == PipelineState::SteadyState && self.below_target() {
            return Flow::Continue;
        }

        select! {
            recv(self.command_rx) -> cmd => match cmd {
                Ok(cmd) => self.absorb(Some(cmd)),
                Err(_) => Flow::Shutdown,
            },
            recv(self.wake_rx) -> _ => Flow::Continue,
            default(self.idle_wait) => Flow::Continue,
        }
    }

    /// Drain pending commands. Restarts are coalesced so only the latest is
    /// applied; a shutdown wins over everything.
    fn absorb(&mut self, first: Option<PipelineCommand>) -> Flow {
        let mut latest: Option<FeatureSelector> = None;
        let mut next = first;

        loop {
            let cmd = match next.take() {
                Some(cmd) => cmd,
                None => match self.command_rx.try_recv() {
                    Ok(cmd) => cmd,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return Flow::Shutdown,
                },
            };
            match cmd {
                PipelineCommand::Shutdown => return Flow::Shutdown,
                PipelineCommand::Restart(selector) => {
                    if latest.is_some() {
                        tracing::trace!("Coalescing superseded restart");
                    }
                    latest = Some(selector);
                }
            }
        }

        match latest {
            Some(selector) => {
                self.restart(selector);
                Flow::Restarted
            }
            None => Flow::Continue,
        }
    }

    /// Generate and publish one window.
    fn step(&mut self) -> Flow {
        let Some(features) = self.features.clone() else {
            self.shared.set_state(PipelineState::Idle);
            return Flow::Continue;
        };

        let raw = match self.generator.generate_window(
            &features,
            self.next_frame,
            self.blocks_per_window,
        ) {
            Ok(raw) => raw,
            Err(Error::InsufficientFeatures { .. }) => {
                self.exhaust(&features);
                return Flow::Continue;
            }
            Err(e) => {
                tracing::error!(
                    "Model '{}' failed at frame {}: {}",
                    self.generator.model_name(),
                    self.next_frame,
                    e
                );
                self.metrics.record_failure();
                self.shared.set_state(PipelineState::Idle);
                return Flow::Continue;
            }
        };

        // A restart that arrived during the model call invalidates this window.
        match self.absorb(None) {
            Flow::Continue => {}
            Flow::Restarted => {
                self.metrics.record_discarded();
                return Flow::Restarted;
            }
            Flow::Shutdown => return Flow::Shutdown,
        }

        let elapsed = raw.elapsed;
        let sliced = self.generator.slice_and_crossfade(raw, self.tail.as_deref());
        let count = sliced.chunks.len();

        for (offset, chunk) in sliced.chunks.into_iter().enumerate() {
            let index = self.next_index + offset as u64;
            self.queue
                .publish(Arc::new(AudioBlock::new(index, self.epoch, chunk)));
        }
        self.next_index += count as u64;
        self.shared.publish_ready(self.next_index);
        self.metrics.record_window(elapsed, count);

        self.tail = Some(sliced.tail);
        self.next_frame += self.blocks_per_window;

        tracing::trace!(
            "Published blocks {}..{} in {:.1} ms",
            self.next_index - count as u64,
            self.next_index,
            elapsed.as_secs_f64() * 1000.0
        );

        if features
            .window(self.next_frame, self.blocks_per_window + 1)
            .is_none()
        {
            self.exhaust(&features);
        }
        Flow::Continue
    }

    fn exhaust(&self, features: &ConditioningFeatures) {
        tracing::debug!(
            "Feature set exhausted after {} blocks ({} frames, epoch {})",
            self.next_index,
            features.len(),
            self.epoch
        );
        self.shared.mark_exhausted();
    }

    /// True while the worker is behind the consumer's lookahead target.
    fn below_target(&self) -> bool {
        let cursor = self
            .shared
            .last_requested()
            .map_or(0, |index| index.saturating_add(1));
        self.next_index < cursor.saturating_add(self.lookahead)
    }

    fn restart(&mut self, selector: FeatureSelector) {
        self.shared.set_state(PipelineState::Restarting);
        self.metrics.record_restart();

        if let Some(features) = self.resolve(&selector) {
            self.features = Some(features);
        }

        self.queue.clear();
        self.tail = None;
        self.next_frame = 0;
        self.next_index = 0;
        self.epoch = self.shared.begin_epoch();

        match &self.features {
            Some(features) => {
                tracing::info!(
                    "Restarted generation at epoch {} with {} frames",
                    self.epoch,
                    features.len()
                );
                self.shared.set_state(PipelineState::FullGeneration);
            }
            None => {
                tracing::info!("Restarted at epoch {} with no features, idling", self.epoch);
                self.shared.set_state(PipelineState::Idle);
            }
        }
    }

    /// Resolve a selector, falling back to the provider's active set and
    /// then to whatever the worker already has.
    fn resolve(&self, selector: &FeatureSelector) -> Option<Arc<ConditioningFeatures>> {
        match self.provider.resolve(selector) {
            Ok(features) => Some(features),
            Err(e) => {
                tracing::warn!("Feature selection failed, keeping active features: {}", e);
                if matches!(selector, FeatureSelector::Active) {
                    return None;
                }
                self.provider.resolve(&FeatureSelector::Active).ok()
            }
        }
    }
}
