//! Generation statistics for the streaming pipeline.
//!
//! Tracks model throughput, inference latency and consumer underruns.

use atomic_float::AtomicF32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Successful model calls
    windows_generated: AtomicU64,
    /// Blocks made visible to consumers
    blocks_published: AtomicU64,
    /// Windows computed but dropped because a restart arrived mid-call
    windows_discarded: AtomicU64,
    restarts: AtomicU64,
    model_failures: AtomicU64,
    /// Requests answered with NotReady
    not_ready: AtomicU64,
    last_inference_ms: AtomicF32,
    peak_inference_ms: AtomicF32,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_window(&self, elapsed: Duration, blocks: usize) {
        let ms = elapsed.as_secs_f32() * 1000.0;
        self.windows_generated.fetch_add(1, Ordering::Relaxed);
        self.blocks_published
            .fetch_add(blocks as u64, Ordering::Relaxed);
        self.last_inference_ms.store(ms, Ordering::Relaxed);
        self.peak_inference_ms.fetch_max(ms, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_discarded(&self) {
        self.windows_discarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failure(&self) {
        self.model_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Called from the audio thread.
    #[inline]
    pub fn record_not_ready(&self) {
        self.not_ready.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineMetricsSnapshot {
        PipelineMetricsSnapshot {
            windows_generated: self.windows_generated.load(Ordering::Relaxed),
            blocks_published: self.blocks_published.load(Ordering::Relaxed),
            windows_discarded: self.windows_discarded.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            model_failures: self.model_failures.load(Ordering::Relaxed),
            not_ready: self.not_ready.load(Ordering::Relaxed),
            last_inference_ms: self.last_inference_ms.load(Ordering::Relaxed),
            peak_inference_ms: self.peak_inference_ms.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineMetricsSnapshot {
    pub windows_generated: u64,
    pub blocks_published: u64,
    pub windows_discarded: u64,
    pub restarts: u64,
    pub model_failures: u64,
    pub not_ready: u64,
    pub last_inference_ms: f32,
    pub peak_inference_ms: f32,
}
