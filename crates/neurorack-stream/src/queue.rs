//! Fixed-capacity ring of published blocks.
//!
//! Block `i` lives in slot `i % capacity`. The worker is the only writer;
//! readers load a slot and check the block's `(epoch, index)` tags, so a slot
//! that was reused or belongs to an older epoch is never mistaken for the
//! requested block.

use arc_swap::ArcSwapOption;
use neurorack_core::AudioBlock;
use std::sync::Arc;

/// What a slot holds relative to a requested index.
#[derive(Debug, Clone)]
pub enum SlotLookup {
    Hit(Arc<AudioBlock>),
    /// The slot has moved on to a later block.
    Overwritten,
    /// Empty, or holds a block from another epoch or an earlier lap.
    Miss,
}

pub struct BlockQueue {
    slots: Box<[ArcSwapOption<AudioBlock>]>,
}

impl BlockQueue {
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity.max(1))
            .map(|_| ArcSwapOption::from(None))
            .collect();
        Self { slots }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Called by the worker thread. Returns the block previously held by the slot.
    pub fn publish(&self, block: Arc<AudioBlock>) -> Option<Arc<AudioBlock>> {
        let slot = self.slot_index(block.index());
        self.slots[slot].swap(Some(block))
    }

    /// Lock-free: one atomic load plus a reference count increment on a hit.
    #[inline]
    pub fn lookup(&self, epoch: u64, index: u64) -> SlotLookup {
        let guard = self.slots[self.slot_index(index)].load();
        match guard.as_ref() {
            Some(block) if block.epoch() == epoch && block.index() == index => {
                SlotLookup::Hit(Arc::clone(block))
            }
            Some(block) if block.epoch() == epoch && block.index() > index => {
                SlotLookup::Overwritten
            }
            _ => SlotLookup::Miss,
        }
    }

    /// Called by the worker thread on restart.
    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.store(None);
        }
    }

    #[inline]
    fn slot_index(&self, index: u64) -> usize {
        (index % self.slots.len() as u64) as usize
    }
}
