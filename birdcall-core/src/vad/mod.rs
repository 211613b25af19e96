//! Speech onset detection against an adaptive noise floor.
//!
//! The recording session asks the detector one question per waiting chunk:
//! has the caller started making noise yet? `OnsetDetector` answers it by
//! comparing the chunk's mean absolute amplitude against a running estimate
//! of the room's background level.

pub mod onset;

pub use onset::OnsetDetector;

/// Outcome of observing one waiting-phase chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnsetDecision {
    /// No usable floor yet (first chunk, or only digital silence so far):
    /// this chunk's volume became the floor.
    Calibrating,
    /// Still background noise (the floor estimate absorbed this chunk).
    Silence,
    /// Volume jumped far enough above the floor to count as speech onset.
    Onset,
}

impl OnsetDecision {
    pub fn is_onset(self) -> bool {
        self == OnsetDecision::Onset
    }
}

/// Mean absolute amplitude of a sample slice (0.0 for an empty slice).
pub fn mean_abs(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|s| s.abs() as f64).sum();
    (sum / samples.len() as f64) as f32
}
