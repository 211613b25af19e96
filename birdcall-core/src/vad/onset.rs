//! Noise-floor tracker with a ratio trigger.
//!
//! ## Algorithm
//!
//! 1. Compute the chunk's mean absolute amplitude ("volume").
//! 2. First chunk of a session → volume becomes the noise floor. A floor of
//!    exactly zero (digital silence) is no floor at all: the next chunk
//!    calibrates again.
//! 3. Once more than `warmup_samples` have elapsed, a chunk whose volume is
//!    greater than `onset_ratio × floor` is an onset.
//! 4. Otherwise fold the chunk into the floor with a moving average over
//!    `window = min(elapsed, floor_window_samples)` samples:
//!    `floor = ((window - len) · floor + len · volume) / window`.

use super::{mean_abs, OnsetDecision};
use crate::audio::secs_to_samples;
use crate::engine::EngineConfig;

#[derive(Debug, Clone)]
pub struct OnsetDetector {
    /// Minimum waiting time before an onset may fire.
    warmup_samples: usize,
    /// Volume / floor ratio that counts as speech.
    onset_ratio: f32,
    /// Upper bound of the moving-average window.
    floor_window_samples: usize,
    /// `None` until the first chunk of a session has been observed.
    /// `Some(0.0)` after pure digital silence, which still counts as uncalibrated.
    noise_floor: Option<f32>,
}

impl OnsetDetector {
    pub fn new(warmup_samples: usize, onset_ratio: f32, floor_window_samples: usize) -> Self {
        Self {
            warmup_samples,
            onset_ratio,
            floor_window_samples: floor_window_samples.max(1),
            noise_floor: None,
        }
    }

    pub fn from_config(sample_rate: u32, config: &EngineConfig) -> Self {
        Self::new(
            secs_to_samples(config.warmup_secs, sample_rate),
            config.onset_ratio,
            secs_to_samples(config.noise_floor_window_secs, sample_rate),
        )
    }

    /// Observe one waiting-phase chunk.
    ///
    /// `elapsed` is the total number of samples waited so far, this chunk
    /// included.
    pub fn observe(&mut self, samples: &[f32], elapsed: usize) -> OnsetDecision {
        debug_assert!(
            elapsed >= samples.len(),
            "elapsed sample count must include the current chunk"
        );
        let volume = mean_abs(samples);

        let floor = match self.noise_floor {
            Some(floor) if floor > 0.0 => floor,
            _ => {
                self.noise_floor = Some(volume);
                return OnsetDecision::Calibrating;
            }
        };

        if elapsed > self.warmup_samples && volume > self.onset_ratio * floor {
            return OnsetDecision::Onset;
        }

        // A chunk longer than the window would give the old floor a negative
        // weight; cap it so the chunk simply replaces the floor instead.
        let len = samples.len() as f64;
        let window = (elapsed.min(self.floor_window_samples) as f64).max(len);
        if window > 0.0 {
            let updated = ((window - len) * floor as f64 + len * volume as f64) / window;
            self.noise_floor = Some(updated as f32);
        }
        OnsetDecision::Silence
    }

    /// Current floor estimate, if calibrated.
    pub fn noise_floor(&self) -> Option<f32> {
        self.noise_floor
    }

    pub fn warmup_samples(&self) -> usize {
        self.warmup_samples
    }

    /// Forget the floor estimate (start of a new session).
    pub fn reset(&mut self) {
        self.noise_floor = None;
    }
}
