//! Raw recording dumps for listening back to what the engine heard.

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;

use crate::error::{BirdcallError, Result};

/// Write `samples` as a 16-bit PCM mono WAV file.
///
/// Samples are clamped to [-1.0, 1.0] before quantisation.
pub fn write_recording(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).map_err(wav_error)?;
    for &sample in samples {
        let v = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(v).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)?;

    info!(path = %path.display(), samples = samples.len(), "recording dumped");
    Ok(())
}

fn wav_error(e: hound::Error) -> BirdcallError {
    match e {
        hound::Error::IoError(io) => BirdcallError::Io(io),
        other => BirdcallError::Other(anyhow::anyhow!("wav encode: {other}")),
    }
}
