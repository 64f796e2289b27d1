//! Disk persistence for extracted feature sets.
//!
//! One file per source id, audio path and extraction settings, so a
//! re-registered path or a changed analysis setup never reads stale
//! descriptors. Binary format, little-endian:
//! `[version: u8] [frames: u32] [width: u32] [values: f32 * frames * width]`.
//! Unreadable or mismatched files are treated as cache misses.

use neurorack_core::{ConditioningFeatures, FeatureConfig, DESCRIPTOR_COUNT};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const FORMAT_VERSION: u8 = 1;
const EXTENSION: &str = "feat";

const FNV_OFFSET: u32 = 0x811c_9dc5;

pub struct FeatureCache {
    dir: PathBuf,
    /// Hash of the extraction settings the cached features depend on
    settings: u32,
}

impl FeatureCache {
    pub fn new(dir: impl Into<PathBuf>, config: &FeatureConfig) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            settings: settings_hash(config),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load(&self, source_id: &str, audio: &Path) -> Option<ConditioningFeatures> {
        let data = fs::read(self.path_for(source_id, audio)).ok()?;
        decode(&data)
    }

    pub fn store(
        &self,
        source_id: &str,
        audio: &Path,
        features: &ConditioningFeatures,
    ) -> io::Result<()> {
        // Write-then-rename so readers never see a partial file.
        let path = self.path_for(source_id, audio);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, encode(features))?;
        fs::rename(tmp, path)
    }

    pub fn remove(&self, source_id: &str, audio: &Path) {
        let _ = fs::remove_file(self.path_for(source_id, audio));
    }

    fn path_for(&self, source_id: &str, audio: &Path) -> PathBuf {
        let name: String = source_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        // Sanitising is lossy; the hash keeps distinct ids apart.
        let mut key = fnv1a(FNV_OFFSET, source_id.as_bytes());
        key = fnv1a(key, &[0]);
        key = fnv1a(key, audio.to_string_lossy().as_bytes());
        key = fnv1a(key, &self.settings.to_le_bytes());
        self.dir
            .join(format!("{}-{:08x}.{}", name, key, EXTENSION))
    }
}

fn fnv1a(seed: u32, bytes: &[u8]) -> u32 {
    bytes.iter().fold(seed, |hash, &b| {
        (hash ^ b as u32).wrapping_mul(0x0100_0193)
    })
}

/// Settings that change extracted values. Source list and cache location
/// are left out.
fn settings_hash(config: &FeatureConfig) -> u32 {
    let mut bytes = Vec::with_capacity(32);
    bytes.extend_from_slice(&config.sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(config.fft_size as u64).to_le_bytes());
    bytes.extend_from_slice(&(config.hop_size as u64).to_le_bytes());
    bytes.extend_from_slice(&config.pitch_min_hz.to_bits().to_le_bytes());
    bytes.extend_from_slice(&config.pitch_max_hz.to_bits().to_le_bytes());
    bytes.extend_from_slice(&config.rolloff_percent.to_bits().to_le_bytes());
    fnv1a(FNV_OFFSET, &bytes)
}

fn encode(features: &ConditioningFeatures) -> Vec<u8> {
    let mut data = Vec::with_capacity(9 + features.len() * DESCRIPTOR_COUNT * 4);
    data.push(FORMAT_VERSION);
    data.extend_from_slice(&(features.len() as u32).to_le_bytes());
    data.extend_from_slice(&(DESCRIPTOR_COUNT as u32).to_le_bytes());
    for value in features.frames().iter().flatten() {
        data.extend_from_slice(&value.to_le_bytes());
    }
    data
}

fn decode(data: &[u8]) -> Option<ConditioningFeatures> {
    if *data.first()? != FORMAT_VERSION {
        return None;
    }
    let frames = u32::from_le_bytes(data.get(1..5)?.try_into().ok()?) as usize;
    let width = u32::from_le_bytes(data.get(5..9)?.try_into().ok()?) as usize;
    if width != DESCRIPTOR_COUNT {
        return None;
    }

    let body = data.get(9..)?;
    if body.len() != frames.checked_mul(width)?.checked_mul(4)? {
        return None;
    }

    let values: Vec<f32> = body
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    ConditioningFeatures::from_flat(&values)
}
