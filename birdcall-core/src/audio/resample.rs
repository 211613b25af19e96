//! Capture-rate → engine-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! Used only when the device cannot open at the engine rate and falls back to
//! its native rate. Conversion runs in the poll loop, never in the device
//! callback. When both rates match the converter is a passthrough and no
//! rubato session is created.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::error;

use crate::error::{BirdcallError, Result};

/// Input frames per rubato call.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Converts f32 mono audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when capture rate == target rate (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    capture_rate: u32,
    target_rate: u32,
    /// Holds partial input blocks between calls.
    input_buf: Vec<f32>,
    chunk_size: usize,
    /// Pre-allocated output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
}

impl RateConverter {
    /// # Errors
    /// Returns `BirdcallError::Resampler` if rubato fails to initialise.
    pub fn new(capture_rate: u32, target_rate: u32, chunk_size: usize) -> Result<Self> {
        let chunk_size = chunk_size.max(1);
        if capture_rate == target_rate {
            return Ok(Self {
                resampler: None,
                capture_rate,
                target_rate,
                input_buf: Vec::new(),
                chunk_size,
                output_buf: Vec::new(),
            });
        }

        let ratio = target_rate as f64 / capture_rate as f64;
        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio
            PolynomialDegree::Cubic,
            chunk_size,
            1, // mono
        )
        .map_err(|e| BirdcallError::Resampler(e.to_string()))?;

        let max_out = resampler.output_frames_max();
        tracing::info!(
            capture_rate,
            target_rate,
            chunk_size,
            "resampling capture stream to engine rate"
        );

        Ok(Self {
            resampler: Some(resampler),
            capture_rate,
            target_rate,
            input_buf: Vec::with_capacity(chunk_size * 2),
            chunk_size,
            output_buf: vec![vec![0f32; max_out]; 1],
        })
    }

    /// Convert incoming samples; the result may be empty while a block is
    /// still filling up. Remainders are kept for the next call.
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(ref mut resampler) = self.resampler else {
            return samples.to_vec();
        };

        self.input_buf.extend_from_slice(samples);
        let mut result = Vec::new();

        while self.input_buf.len() >= self.chunk_size {
            let input_slice = &self.input_buf[..self.chunk_size];
            match resampler.process_into_buffer(&[input_slice], &mut self.output_buf, None) {
                Ok((_consumed, produced)) => {
                    result.extend_from_slice(&self.output_buf[0][..produced]);
                }
                Err(e) => {
                    error!("resampler process error: {e}");
                }
            }
            self.input_buf.drain(..self.chunk_size);
        }

        result
    }

    /// Drop buffered input and filter state (start of a new session).
    pub fn reset(&mut self) {
        self.input_buf.clear();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }

    pub fn capture_rate(&self) -> u32 {
        self.capture_rate
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }
}

impl std::fmt::Debug for RateConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateConverter")
            .field("capture_rate", &self.capture_rate)
            .field("target_rate", &self.target_rate)
            .field("buffered", &self.input_buf.len())
            .finish_non_exhaustive()
    }
}
