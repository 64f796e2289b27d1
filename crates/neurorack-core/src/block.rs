//! Audio blocks handed from the generation worker to the audio consumer.

use std::sync::Arc;

/// A fixed-size run of generated samples.
///
/// Immutable once published. `epoch` identifies the feature generation that
/// produced it so consumers never mix blocks across restarts.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    index: u64,
    epoch: u64,
    samples: Box<[f32]>,
}

impl AudioBlock {
    pub fn new(index: u64, epoch: u64, samples: Box<[f32]>) -> Self {
        Self {
            index,
            epoch,
            samples,
        }
    }

    #[inline]
    pub fn index(&self) -> u64 {
        self.index
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Result of a non-blocking block request.
#[derive(Debug, Clone)]
pub enum BlockResponse {
    Ready(Arc<AudioBlock>),
    /// Not generated yet. The caller should output silence and retry later.
    NotReady,
    /// The active feature set is exhausted and the index lies past the last block.
    EndOfStream,
    /// The block was generated but has since dropped out of the retention window.
    Evicted,
}

impl BlockResponse {
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, BlockResponse::Ready(_))
    }

    pub fn block(&self) -> Option<&Arc<AudioBlock>> {
        match self {
            BlockResponse::Ready(block) => Some(block),
            _ => None,
        }
    }

    pub fn into_block(self) -> Option<Arc<AudioBlock>> {
        match self {
            BlockResponse::Ready(block) => Some(block),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_accessors() {
        let block = AudioBlock::new(3, 1, vec![0.5; 4].into_boxed_slice());
        assert_eq!(block.index(), 3);
        assert_eq!(block.epoch(), 1);
        assert_eq!(block.len(), 4);
        assert_eq!(block.samples()[2], 0.5);
    }

    #[test]
    fn test_response_helpers() {
        let block = Arc::new(AudioBlock::new(0, 0, vec![0.0; 2].into_boxed_slice()));
        let ready = BlockResponse::Ready(Arc::clone(&block));
        assert!(ready.is_ready());
        assert_eq!(ready.block().map(|b| b.index()), Some(0));
        assert!(ready.into_block().is_some());

        assert!(!BlockResponse::NotReady.is_ready());
        assert!(BlockResponse::EndOfStream.into_block().is_none());
    }
}
