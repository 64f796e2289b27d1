//! Instrument configuration.
//!
//! Loaded from TOML; every section falls back to defaults for missing keys.
//!
//! ```toml
//! [stream]
//! block_size = 512
//! blocks_per_window = 15
//!
//! [features]
//! cache_dir = "/var/cache/neurorack"
//!
//! [[features.sources]]
//! id = "bell"
//! path = "samples/bell.wav"
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Generation and buffering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Samples per audio block (default: 512)
    pub block_size: usize,
    /// Blocks published per model call (default: 15)
    pub blocks_per_window: usize,
    /// Blocks the worker keeps ready ahead of the consumer (default: 30)
    pub lookahead_blocks: usize,
    /// Already-consumed blocks kept available behind the consumer (default: 64)
    pub history_blocks: usize,
    /// Worker park timeout in milliseconds (default: 20)
    pub idle_wait_ms: u64,
    /// Model passes run before serving (default: 1)
    pub warmup_passes: usize,
    /// Pending control commands before senders are refused (default: 16)
    pub command_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            block_size: 512,
            blocks_per_window: 15,
            lookahead_blocks: 30,
            history_blocks: 64,
            idle_wait_ms: 20,
            warmup_passes: 1,
            command_capacity: 16,
        }
    }
}

impl StreamConfig {
    /// Frames per model call: one per published block plus the overlap frame.
    #[inline]
    pub fn window_frames(&self) -> usize {
        self.blocks_per_window + 1
    }

    /// Samples returned by one model call.
    #[inline]
    pub fn window_samples(&self) -> usize {
        self.window_frames() * self.block_size
    }

    /// Slots in the block ring.
    #[inline]
    pub fn ring_capacity(&self) -> usize {
        self.history_blocks + self.lookahead_blocks + self.blocks_per_window
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidConfig("block_size must be > 0".into()));
        }
        if self.blocks_per_window == 0 {
            return Err(Error::InvalidConfig("blocks_per_window must be > 0".into()));
        }
        if self.lookahead_blocks == 0 {
            return Err(Error::InvalidConfig("lookahead_blocks must be > 0".into()));
        }
        if self.command_capacity == 0 {
            return Err(Error::InvalidConfig("command_capacity must be > 0".into()));
        }
        Ok(())
    }
}

/// A named audio file to extract features from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub path: PathBuf,
}

/// Feature extraction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Analysis sample rate; sources are resampled to it (default: 22050)
    pub sample_rate: u32,
    /// STFT window length (default: 2048)
    pub fft_size: usize,
    /// Samples between frames (default: 512)
    pub hop_size: usize,
    pub pitch_min_hz: f32,
    pub pitch_max_hz: f32,
    /// Energy fraction for spectral roll-off (default: 0.85)
    pub rolloff_percent: f32,
    /// Directory for persisted feature sets. `None` disables the disk cache.
    pub cache_dir: Option<PathBuf>,
    pub sources: Vec<SourceConfig>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            fft_size: 2048,
            hop_size: 512,
            pitch_min_hz: 50.0,
            pitch_max_hz: 5000.0,
            rolloff_percent: 0.85,
            cache_dir: None,
            sources: Vec::new(),
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate < 8000 || self.sample_rate > 384_000 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.fft_size < 16 || self.hop_size == 0 || self.hop_size > self.fft_size {
            return Err(Error::InvalidConfig(format!(
                "fft_size {} / hop_size {} invalid",
                self.fft_size, self.hop_size
            )));
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        if !(self.pitch_min_hz > 0.0
            && self.pitch_min_hz < self.pitch_max_hz
            && self.pitch_max_hz <= nyquist)
        {
            return Err(Error::InvalidConfig(format!(
                "pitch range {}-{} Hz invalid for {} Hz",
                self.pitch_min_hz, self.pitch_max_hz, self.sample_rate
            )));
        }
        if !(self.rolloff_percent > 0.0 && self.rolloff_percent < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "rolloff_percent {} must be within (0, 1)",
                self.rolloff_percent
            )));
        }
        let mut ids: Vec<&str> = self.sources.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(Error::InvalidConfig(format!(
                "duplicate source id '{}'",
                pair[0]
            )));
        }
        Ok(())
    }

    pub fn source_path(&self, id: &str) -> Option<&Path> {
        self.sources
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.path.as_path())
    }
}

/// Top-level instrument configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RackConfig {
    pub stream: StreamConfig,
    pub features: FeatureConfig,
}

impl RackConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: RackConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Relative source paths are resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&contents)?;

        if let Some(base) = path.parent() {
            for source in &mut config.features.sources {
                if source.path.is_relative() {
                    source.path = base.join(&source.path);
                }
            }
            if let Some(dir) = config.features.cache_dir.as_mut() {
                if dir.is_relative() {
                    *dir = base.join(&*dir);
                }
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.stream.validate()?;
        self.features.validate()
    }
}
