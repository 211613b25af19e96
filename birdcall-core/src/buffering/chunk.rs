//! Typed sample chunk handed from the device callback to the poll loop.

/// A contiguous block of mono PCM samples at a known sample rate.
///
/// Allocated once in the producer context and moved into the capture buffer;
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleChunk {
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz of `samples`.
    pub sample_rate: u32,
}

impl SampleChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the duration of this chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
