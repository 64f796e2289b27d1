//! Sequential playback over a [`BlockRequestHandle`].
//!
//! Turns block-granular responses into arbitrary-length buffer fills for an
//! audio callback. Never blocks: missing blocks become silence.

use crate::handle::BlockRequestHandle;
use neurorack_core::{AudioBlock, BlockResponse};
use std::sync::Arc;

/// Outcome of one [`BlockPlayer::fill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStatus {
    Complete,
    /// The next block was not ready; the last `silent` samples are zeros.
    Partial { silent: usize },
    /// The stream ended; everything after the last block is zeros.
    EndOfStream,
}

pub struct BlockPlayer {
    handle: BlockRequestHandle,
    epoch: u64,
    next_index: u64,
    current: Option<Arc<AudioBlock>>,
    offset: usize,
    underruns: u64,
    skipped: u64,
}

impl BlockPlayer {
    pub fn new(handle: BlockRequestHandle) -> Self {
        let epoch = handle.epoch();
        Self {
            handle,
            epoch,
            next_index: 0,
            current: None,
            offset: 0,
            underruns: 0,
            skipped: 0,
        }
    }

    /// Fill `out` with the next samples of the stream.
    ///
    /// A restart observed mid-stream rewinds playback to block 0 of the new
    /// epoch.
    pub fn fill(&mut self, out: &mut [f32]) -> FillStatus {
        let mut written = 0;

        while written < out.len() {
            if self.handle.epoch() != self.epoch {
                self.rewind();
            }

            if let Some(block) = &self.current {
                let samples = &block.samples()[self.offset..];
                let n = samples.len().min(out.len() - written);
                out[written..written + n].copy_from_slice(&samples[..n]);
                written += n;
                self.offset += n;
                if self.offset >= block.len() {
                    self.current = None;
                    self.offset = 0;
                }
                continue;
            }

            match self.handle.request_block(self.next_index) {
                BlockResponse::Ready(block) => {
                    if block.epoch() != self.epoch {
                        self.rewind();
                        continue;
                    }
                    self.current = Some(block);
                    self.offset = 0;
                    self.next_index += 1;
                }
                BlockResponse::Evicted => {
                    self.skipped += 1;
                    self.next_index += 1;
                }
                BlockResponse::NotReady => {
                    self.underruns += 1;
                    let silent = out.len() - written;
                    out[written..].fill(0.0);
                    return FillStatus::Partial { silent };
                }
                BlockResponse::EndOfStream => {
                    out[written..].fill(0.0);
                    return FillStatus::EndOfStream;
                }
            }
        }

        FillStatus::Complete
    }

    /// Index of the next block to be requested.
    pub fn position(&self) -> u64 {
        self.next_index
    }

    /// Jump to the start of block `index` in the current epoch.
    pub fn seek(&mut self, index: u64) {
        self.next_index = index;
        self.current = None;
        self.offset = 0;
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Fills that ended early because a block was not ready.
    pub fn underruns(&self) -> u64 {
        self.underruns
    }

    /// Blocks skipped because they had already left the ring.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn handle(&self) -> &BlockRequestHandle {
        &self.handle
    }

    fn rewind(&mut self) {
        self.epoch = self.handle.epoch();
        self.seek(0);
    }
}

impl std::fmt::Debug for BlockPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockPlayer")
            .field("epoch", &self.epoch)
            .field("next_index", &self.next_index)
            .field("offset", &self.offset)
            .field("underruns", &self.underruns)
            .finish()
    }
}
