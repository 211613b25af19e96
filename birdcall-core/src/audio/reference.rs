//! Reference call loading.
//!
//! A reference is a WAV file mastered at (a multiple of) the native rate.
//! It is downmixed to mono, decimated by `file_rate / SAMPLE_RATE` (integer
//! division, no anti-alias filter) and transformed with the same spectral
//! parameters as live recordings.

use std::path::Path;

use hound::{SampleFormat, WavReader};
use tracing::{info, warn};

use super::SAMPLE_RATE;
use crate::error::{BirdcallError, Result};
use crate::spectral::{SpectralTransform, Spectrogram};

/// A transformed reference call.
#[derive(Debug, Clone)]
pub struct ReferenceCall {
    pub spectrogram: Spectrogram,
    /// Playing time of the source file in seconds.
    pub duration_secs: f32,
}

/// Decoded mono samples at the file's own rate.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decode, decimate and transform the reference at `path`.
pub fn load_reference(path: &Path, transform: &SpectralTransform) -> Result<ReferenceCall> {
    let decoded = decode_wav(path)?;
    let factor = decimation_factor(decoded.sample_rate).ok_or_else(|| {
        load_error(
            path,
            format!(
                "sample rate {} Hz is below the engine rate {SAMPLE_RATE} Hz",
                decoded.sample_rate
            ),
        )
    })?;
    if decoded.sample_rate % SAMPLE_RATE != 0 {
        warn!(
            path = %path.display(),
            file_rate = decoded.sample_rate,
            factor,
            "reference rate is not a multiple of the engine rate, decimating anyway"
        );
    }

    let decimated = decimate(&decoded.samples, factor);
    let spectrogram = transform.transform(&decimated);
    let duration_secs = decoded.duration_secs();

    info!(
        path = %path.display(),
        duration_secs,
        frames = spectrogram.frames(),
        "reference call loaded"
    );

    Ok(ReferenceCall {
        spectrogram,
        duration_secs,
    })
}

/// Read a WAV file into mono f32 samples, averaging channels.
pub fn decode_wav(path: &Path) -> Result<DecodedAudio> {
    let mut reader = WavReader::open(path).map_err(|e| load_error(path, e.to_string()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| load_error(path, e.to_string()))?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| load_error(path, e.to_string()))?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Integer step from `file_rate` down to the engine rate; `None` if the file
/// is slower than the engine.
pub fn decimation_factor(file_rate: u32) -> Option<usize> {
    match (file_rate / SAMPLE_RATE) as usize {
        0 => None,
        factor => Some(factor),
    }
}

/// Keep every `factor`-th sample, starting with the first.
pub fn decimate(samples: &[f32], factor: usize) -> Vec<f32> {
    samples.iter().step_by(factor.max(1)).copied().collect()
}

fn load_error(path: &Path, reason: String) -> BirdcallError {
    BirdcallError::ReferenceLoad {
        path: path.to_path_buf(),
        reason,
    }
}
