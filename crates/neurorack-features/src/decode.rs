//! WAV decoding to mono at the analysis sample rate.

use rubato::{FftFixedIn, Resampler};
use std::path::Path;
use thiserror::Error;

const RESAMPLE_CHUNK: usize = 1024;
const RESAMPLE_SUB_CHUNKS: usize = 2;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Resampler construction failed: {0}")]
    ResamplerInit(#[from] rubato::ResamplerConstructionError),

    #[error("Resampling failed: {0}")]
    Resample(#[from] rubato::ResampleError),

    #[error("file contains no samples")]
    Empty,
}

/// Read a WAV file, mix it down to mono and resample to `target_rate`.
pub fn decode_mono(path: &Path, target_rate: u32) -> Result<Vec<f32>, DecodeError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mono: Vec<f32> = interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    if mono.is_empty() {
        return Err(DecodeError::Empty);
    }

    resample(&mono, spec.sample_rate, target_rate)
}

/// Band-limited sample rate conversion of a mono signal.
pub fn resample(input: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>, DecodeError> {
    if source_rate == target_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        RESAMPLE_CHUNK,
        RESAMPLE_SUB_CHUNKS,
        1,
    )?;

    let expected =
        (input.len() as f64 * target_rate as f64 / source_rate as f64).ceil() as usize;
    // Output is shifted by the filter delay; keep feeding zeros until it is covered.
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(delay + expected + RESAMPLE_CHUNK);
    let mut chunk = vec![0.0f32; RESAMPLE_CHUNK];

    let mut pos = 0;
    while output.len() < delay + expected {
        let needed = resampler.input_frames_next();
        chunk.resize(needed, 0.0);
        chunk.fill(0.0);
        if pos < input.len() {
            let take = needed.min(input.len() - pos);
            chunk[..take].copy_from_slice(&input[pos..pos + take]);
        }

        let channels = [chunk.as_slice()];
        let processed = resampler.process(&channels[..], None)?;
        if processed[0].is_empty() {
            break;
        }
        output.extend_from_slice(&processed[0]);
        pos += needed;
    }

    let end = (delay + expected).min(output.len());
    Ok(output[delay.min(end)..end].to_vec())
}
