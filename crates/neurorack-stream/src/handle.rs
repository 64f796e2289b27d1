//! Consumer-facing block request API.

use crate::command::PipelineCommand;
use crate::metrics::{PipelineMetrics, PipelineMetricsSnapshot};
use crate::queue::{BlockQueue, SlotLookup};
use crate::state::{PipelineState, SharedPipelineState};
use crate::{Error, Result};
use crossbeam_channel::{Sender, TrySendError};
use neurorack_core::{BlockResponse, FeatureSelector};
use std::sync::Arc;

/// Cloneable handle for requesting blocks and signalling restarts.
///
/// `request_block` is safe to call from the audio thread: it never blocks,
/// never allocates and takes no locks.
#[derive(Clone)]
pub struct BlockRequestHandle {
    shared: Arc<SharedPipelineState>,
    queue: Arc<BlockQueue>,
    metrics: Arc<PipelineMetrics>,
    command_tx: Sender<PipelineCommand>,
    wake_tx: Sender<()>,
    block_size: usize,
    lookahead: u64,
}

impl BlockRequestHandle {
    pub(crate) fn new(
        shared: Arc<SharedPipelineState>,
        queue: Arc<BlockQueue>,
        metrics: Arc<PipelineMetrics>,
        command_tx: Sender<PipelineCommand>,
        wake_tx: Sender<()>,
        block_size: usize,
        lookahead: usize,
    ) -> Self {
        Self {
            shared,
            queue,
            metrics,
            command_tx,
            wake_tx,
            block_size,
            lookahead: lookahead as u64,
        }
    }

    /// Fetch block `index` of the current epoch.
    ///
    /// The request also moves the consumer cursor the worker paces itself
    /// by. The cursor never runs past the generated edge, so asking for a far
    /// index (for example a position held over from before a restart) only
    /// pulls generation forward one lookahead at a time and cannot push
    /// unconsumed blocks out of the ring.
    pub fn request_block(&self, index: u64) -> BlockResponse {
        let epoch = self.shared.epoch();
        let ready = self.shared.ready_count();

        let mut response = if index < ready {
            match self.queue.lookup(epoch, index) {
                SlotLookup::Hit(block) => BlockResponse::Ready(block),
                SlotLookup::Overwritten => BlockResponse::Evicted,
                SlotLookup::Miss => BlockResponse::NotReady,
            }
        } else if self.shared.final_count().is_some_and(|n| index >= n) {
            BlockResponse::EndOfStream
        } else {
            BlockResponse::NotReady
        };

        // A restart landed while we were reading.
        if self.shared.epoch() != epoch {
            response = BlockResponse::NotReady;
        } else {
            self.shared.record_request(epoch, index.min(ready));
        }

        if matches!(response, BlockResponse::NotReady) {
            self.metrics.record_not_ready();
        }
        self.wake_if_behind(index, ready);
        response
    }

    /// Ask the worker to discard its output and regenerate from `selector`.
    ///
    /// Returns immediately. Restarts queued before the worker gets to them
    /// are coalesced; the latest one wins.
    pub fn notify_restart(&self, selector: FeatureSelector) -> Result<()> {
        match self.command_tx.try_send(PipelineCommand::Restart(selector)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::CommandQueueFull),
            Err(TrySendError::Disconnected(_)) => Err(Error::PipelineStopped),
        }
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.shared.epoch()
    }

    #[inline]
    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    /// Highest index generated in the current epoch.
    pub fn last_generated_index(&self) -> Option<u64> {
        self.shared.ready_count().checked_sub(1)
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn metrics(&self) -> PipelineMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Ring the worker's doorbell when the consumer is closing in on the
    /// generated edge. At most one ring is outstanding at a time.
    #[inline]
    fn wake_if_behind(&self, index: u64, ready: u64) {
        if self.shared.state() != PipelineState::SteadyState {
            return;
        }
        let target = index.saturating_add(1).saturating_add(self.lookahead);
        if ready < target && self.shared.claim_wake() {
            let _ = self.wake_tx.try_send(());
        }
    }
}

impl std::fmt::Debug for BlockRequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockRequestHandle")
            .field("epoch", &self.shared.epoch())
            .field("state", &self.shared.state())
            .field("ready", &self.shared.ready_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use neurorack_core::AudioBlock;

    struct Fixture {
        handle: BlockRequestHandle,
        shared: Arc<SharedPipelineState>,
        queue: Arc<BlockQueue>,
        command_rx: crossbeam_channel::Receiver<PipelineCommand>,
        wake_rx: crossbeam_channel::Receiver<()>,
    }

    fn fixture(capacity: usize) -> Fixture {
        let shared = Arc::new(SharedPipelineState::new());
        let queue = Arc::new(BlockQueue::new(capacity));
        let (command_tx, command_rx) = bounded(2);
        let (wake_tx, wake_rx) = bounded(1);
        let handle = BlockRequestHandle::new(
            Arc::clone(&shared),
            Arc::clone(&queue),
            Arc::new(PipelineMetrics::new()),
            command_tx,
            wake_tx,
            4,
            2,
        );
        Fixture {
            handle,
            shared,
            queue,
            command_rx,
            wake_rx,
        }
    }

    fn publish(f: &Fixture, epoch: u64, count: u64) {
        for i in 0..count {
            f.queue.publish(Arc::new(AudioBlock::new(
                i,
                epoch,
                vec![i as f32; 4].into_boxed_slice(),
            )));
            f.shared.publish_ready(i + 1);
        }
    }

    #[test]
    fn test_not_ready_before_generation() {
        let f = fixture(8);
        assert!(matches!(f.handle.request_block(0), BlockResponse::NotReady));
        assert_eq!(f.handle.metrics().not_ready, 1);
        assert_eq!(f.shared.last_requested(), Some(0));
        assert_eq!(f.handle.last_generated_index(), None);
    }

    #[test]
    fn test_ready_blocks() {
        let f = fixture(8);
        let epoch = f.shared.begin_epoch();
        publish(&f, epoch, 3);

        let block = f.handle.request_block(2).into_block().unwrap();
        assert_eq!(block.index(), 2);
        assert_eq!(block.epoch(), epoch);
        assert!(matches!(f.handle.request_block(3), BlockResponse::NotReady));
        assert_eq!(f.handle.last_generated_index(), Some(2));
    }

    #[test]
    fn test_end_of_stream() {
        let f = fixture(8);
        let epoch = f.shared.begin_epoch();
        publish(&f, epoch, 3);
        f.shared.mark_exhausted();

        assert!(f.handle.request_block(2).is_ready());
        assert!(matches!(f.handle.request_block(3), BlockResponse::EndOfStream));
        assert!(matches!(f.handle.request_block(1000), BlockResponse::EndOfStream));
    }

    #[test]
    fn test_evicted_blocks() {
        let f = fixture(4);
        let epoch = f.shared.begin_epoch();
        publish(&f, epoch, 6);

        assert!(matches!(f.handle.request_block(1), BlockResponse::Evicted));
        assert!(f.handle.request_block(2).is_ready());
    }

    #[test]
    fn test_old_epoch_blocks_are_not_served() {
        let f = fixture(8);
        let old = f.shared.begin_epoch();
        publish(&f, old, 3);
        f.shared.begin_epoch();

        // Stale blocks remain in the ring but belong to the previous epoch.
        f.shared.publish_ready(3);
        assert!(matches!(f.handle.request_block(0), BlockResponse::NotReady));
    }

    #[test]
    fn test_far_request_is_clamped_to_generated_edge() {
        let f = fixture(8);
        let epoch = f.shared.begin_epoch();
        publish(&f, epoch, 3);

        assert!(matches!(f.handle.request_block(201), BlockResponse::NotReady));
        assert_eq!(f.shared.last_requested(), Some(3));

        f.handle.request_block(1);
        assert_eq!(f.shared.last_requested(), Some(1));
    }

    #[test]
    fn test_doorbell_only_in_steady_state() {
        let f = fixture(8);
        let epoch = f.shared.begin_epoch();
        publish(&f, epoch, 2);

        f.handle.request_block(0);
        assert!(f.wake_rx.try_recv().is_err());

        f.shared.set_state(PipelineState::SteadyState);
        f.handle.request_block(0);
        assert!(f.wake_rx.try_recv().is_ok());

        // Pending until the worker clears it.
        f.handle.request_block(1);
        assert!(f.wake_rx.try_recv().is_err());
        f.shared.clear_wake();
        f.handle.request_block(1);
        assert!(f.wake_rx.try_recv().is_ok());
    }

    #[test]
    fn test_notify_restart_errors() {
        let f = fixture(8);
        f.handle.notify_restart(FeatureSelector::Active).unwrap();
        f.handle.notify_restart(FeatureSelector::Active).unwrap();
        assert!(matches!(
            f.handle.notify_restart(FeatureSelector::Active),
            Err(Error::CommandQueueFull)
        ));

        let Fixture { handle, command_rx, .. } = f;
        drop(command_rx);
        assert!(matches!(
            handle.notify_restart(FeatureSelector::Active),
            Err(Error::PipelineStopped)
        ));
    }
}
