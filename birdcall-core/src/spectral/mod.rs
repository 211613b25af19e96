//! Smoothed magnitude spectrogram.
//!
//! ## Stages
//!
//! ```text
//! samples ─► frames of W samples every S samples (no window function)
//!         ─► |DFT| bins 0..=W/2                     → column per frame
//!         ─► boxcar along frequency (per frame)
//!         ─► boxcar along time (per bin)
//! ```
//!
//! With the default config at 8820 Hz: `W = 2205` (≈4 Hz bins), `S = 88`
//! (≈10 ms), 50-bin frequency kernel (200 Hz), 20-frame time kernel (0.2 s).

pub mod similarity;
pub mod smoothing;

use std::fmt;
use std::sync::Arc;

use ndarray::{Array2, ArrayView2, Axis};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::engine::EngineConfig;

/// Grid of non-negative magnitudes indexed by `[bin, frame]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    values: Array2<f32>,
}

impl Spectrogram {
    pub fn new(values: Array2<f32>) -> Self {
        Self { values }
    }

    /// An empty spectrogram with `bins` frequency bins.
    pub fn empty(bins: usize) -> Self {
        Self::new(Array2::zeros((bins, 0)))
    }

    pub fn bins(&self) -> usize {
        self.values.nrows()
    }

    pub fn frames(&self) -> usize {
        self.values.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    pub fn values(&self) -> ArrayView2<'_, f32> {
        self.values.view()
    }

    pub fn into_values(self) -> Array2<f32> {
        self.values
    }
}

/// Frame geometry and smoothing widths, all in samples / bins / frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectralParams {
    /// Analysis window length `W`.
    pub window: usize,
    /// Hop between frames `S`.
    pub hop: usize,
    /// Frequency kernel width in bins.
    pub freq_kernel: usize,
    /// Time kernel width in frames.
    pub time_kernel: usize,
}

impl SpectralParams {
    pub fn from_config(sample_rate: u32, config: &EngineConfig) -> Self {
        let rate = sample_rate as f64;
        let freq_step = config.freq_step_hz as f64;
        let time_step = config.time_step_secs as f64;
        Self {
            window: ((rate / freq_step) as usize).max(2),
            hop: ((rate * time_step) as usize).max(1),
            freq_kernel: (config.freq_smoothing_hz as f64 / freq_step).round().max(1.0) as usize,
            time_kernel: (config.time_smoothing_secs as f64 / time_step).round().max(1.0) as usize,
        }
    }

    /// Number of magnitude bins per frame.
    pub fn bins(&self) -> usize {
        self.window / 2 + 1
    }

    /// Frames produced for an input of `len` samples:
    /// `max(0, floor((len - W) / S))`.
    pub fn frame_count(&self, len: usize) -> usize {
        len.saturating_sub(self.window) / self.hop
    }
}

/// Reusable spectrogram builder; the FFT plan is made once.
#[derive(Clone)]
pub struct SpectralTransform {
    params: SpectralParams,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectralTransform {
    pub fn new(params: SpectralParams) -> Self {
        let fft = FftPlanner::<f32>::new().plan_fft_forward(params.window);
        Self { params, fft }
    }

    pub fn from_config(sample_rate: u32, config: &EngineConfig) -> Self {
        Self::new(SpectralParams::from_config(sample_rate, config))
    }

    pub fn params(&self) -> SpectralParams {
        self.params
    }

    /// Build the smoothed magnitude spectrogram of `samples`.
    pub fn transform(&self, samples: &[f32]) -> Spectrogram {
        let SpectralParams {
            window,
            hop,
            freq_kernel,
            time_kernel,
        } = self.params;
        let bins = self.params.bins();
        let frames = self.params.frame_count(samples.len());

        let mut grid = Array2::<f32>::zeros((bins, frames));
        if frames == 0 {
            return Spectrogram::new(grid);
        }

        let mut buf = vec![Complex::new(0.0f32, 0.0); window];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); self.fft.get_inplace_scratch_len()];

        for (frame, mut column) in grid.axis_iter_mut(Axis(1)).enumerate() {
            let start = frame * hop;
            for (dst, &s) in buf.iter_mut().zip(&samples[start..start + window]) {
                *dst = Complex::new(s, 0.0);
            }
            self.fft.process_with_scratch(&mut buf, &mut scratch);
            for (dst, c) in column.iter_mut().zip(&buf[..bins]) {
                *dst = c.norm();
            }
        }

        smoothing::smooth_axis(&mut grid, Axis(0), freq_kernel);
        smoothing::smooth_axis(&mut grid, Axis(1), time_kernel);

        Spectrogram::new(grid)
    }
}

impl fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
