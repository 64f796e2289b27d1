//! Shared state between the generation worker and block consumers.
//!
//! All fields are atomic for RT-safe cross-thread access. The worker is the
//! only writer of everything except `cursor` and `wake_pending`, which
//! consumers update.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

const NONE: u64 = u64::MAX;

// The consumer cursor packs the low epoch bits above the block index so a
// write from an earlier epoch can never pass for the current one.
const CURSOR_INDEX_BITS: u32 = 40;
const CURSOR_INDEX_MAX: u64 = (1 << CURSOR_INDEX_BITS) - 2;

#[inline]
fn pack_cursor(epoch: u64, index: u64) -> u64 {
    (epoch << CURSOR_INDEX_BITS) | index.min(CURSOR_INDEX_MAX)
}

#[inline]
fn cursor_epoch_tag(epoch: u64) -> u64 {
    epoch & (u64::MAX >> CURSOR_INDEX_BITS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PipelineState {
    /// No feature set assigned, or parked after a model failure.
    Idle = 0,
    /// Generating windows back to back until the lookahead target is met.
    FullGeneration = 1,
    /// Generating one window at a time as the consumer advances.
    SteadyState = 2,
    /// The feature set has no room for another window.
    Exhausted = 3,
    /// Discarding the previous epoch and switching feature sets.
    Restarting = 4,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineState::FullGeneration,
            2 => PipelineState::SteadyState,
            3 => PipelineState::Exhausted,
            4 => PipelineState::Restarting,
            _ => PipelineState::Idle,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::FullGeneration => "full-generation",
            PipelineState::SteadyState => "steady-state",
            PipelineState::Exhausted => "exhausted",
            PipelineState::Restarting => "restarting",
        }
    }
}

pub struct SharedPipelineState {
    state: AtomicU8,
    epoch: AtomicU64,
    /// Blocks published in the current epoch (= last generated index + 1).
    ready: AtomicU64,
    /// Block count at exhaustion; `NONE` while more can be generated.
    final_count: AtomicU64,
    /// Epoch-tagged consumer cursor; `NONE` before the first request of an epoch.
    cursor: AtomicU64,
    /// Set by a consumer that rang the doorbell, cleared by the worker.
    wake_pending: AtomicBool,
}

impl Default for SharedPipelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedPipelineState {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(PipelineState::Idle as u8),
            epoch: AtomicU64::new(0),
            ready: AtomicU64::new(0),
            final_count: AtomicU64::new(NONE),
            cursor: AtomicU64::new(NONE),
            wake_pending: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    #[inline]
    pub fn ready_count(&self) -> u64 {
        self.ready.load(Ordering::Acquire)
    }

    #[inline]
    pub fn final_count(&self) -> Option<u64> {
        match self.final_count.load(Ordering::Acquire) {
            NONE => None,
            n => Some(n),
        }
    }

    /// Consumer cursor of the current epoch. Cursors written during an
    /// earlier epoch read as `None`.
    #[inline]
    pub fn last_requested(&self) -> Option<u64> {
        let packed = self.cursor.load(Ordering::Acquire);
        if packed == NONE || packed >> CURSOR_INDEX_BITS != cursor_epoch_tag(self.epoch()) {
            return None;
        }
        Some(packed & ((1 << CURSOR_INDEX_BITS) - 1))
    }

    // --- consumer side ---

    /// Record the consumer position observed while `epoch` was current.
    #[inline]
    pub(crate) fn record_request(&self, epoch: u64, index: u64) {
        self.cursor
            .store(pack_cursor(epoch, index), Ordering::Release);
    }

    /// Returns true if this caller should ring the doorbell.
    #[inline]
    pub(crate) fn claim_wake(&self) -> bool {
        !self.wake_pending.swap(true, Ordering::AcqRel)
    }

    // --- worker side ---

    pub(crate) fn set_state(&self, state: PipelineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn clear_wake(&self) {
        self.wake_pending.store(false, Ordering::Release);
    }

    /// Make `count` blocks visible. The blocks must already be in the queue.
    pub(crate) fn publish_ready(&self, count: u64) {
        self.ready.store(count, Ordering::Release);
    }

    pub(crate) fn mark_exhausted(&self) {
        self.final_count
            .store(self.ready.load(Ordering::Acquire), Ordering::Release);
        self.set_state(PipelineState::Exhausted);
    }

    /// Start a new epoch with nothing ready. Returns the new epoch.
    ///
    /// Counters are reset before the epoch is bumped, so a reader that sees
    /// the new epoch also sees the reset counters.
    pub(crate) fn begin_epoch(&self) -> u64 {
        self.ready.store(0, Ordering::Release);
        self.final_count.store(NONE, Ordering::Release);
        self.cursor.store(NONE, Ordering::Release);
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }
}
