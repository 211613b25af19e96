//! Recording state machine.
//!
//! ```text
//! Waiting ──onset──► Recording ──target reached──► Finished
//!    │
//!    └──max delay exceeded──► Timeout
//! ```
//!
//! The session is fed one chunk at a time by [`MimicEngine::poll`]; it never
//! touches the capture buffer itself, which keeps it trivially testable.
//!
//! The chunk that triggers the `Waiting → Recording` transition is consumed
//! by the transition and is **not** part of the recording. Detection always
//! lags the true onset by at least one chunk, so callers ask for a little more
//! duration than the reference needs.
//!
//! [`MimicEngine::poll`]: crate::engine::MimicEngine::poll

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::vad::{OnsetDecision, OnsetDetector};

/// Lifecycle phase of a recording attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Listening for speech onset.
    Waiting,
    /// Onset detected, accumulating samples.
    Recording,
    /// Target duration reached. Terminal.
    Finished,
    /// No onset before the maximum delay. Terminal.
    Timeout,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Finished | Phase::Timeout)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Waiting => "waiting",
            Phase::Recording => "recording",
            Phase::Finished => "finished",
            Phase::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordingSession {
    phase: Phase,
    detector: OnsetDetector,
    /// Samples seen while `Waiting`.
    delay: usize,
    recording: Vec<f32>,
}

impl RecordingSession {
    pub fn new(detector: OnsetDetector) -> Self {
        Self {
            phase: Phase::Waiting,
            detector,
            delay: 0,
            recording: Vec::new(),
        }
    }

    /// Back to `Waiting` with an empty recording and an uncalibrated floor.
    pub fn reset(&mut self) {
        self.phase = Phase::Waiting;
        self.detector.reset();
        self.delay = 0;
        self.recording.clear();
    }

    /// Advance the state machine by one chunk and return the resulting phase.
    ///
    /// `target_samples` is the recording length that ends the session;
    /// `max_delay_samples` bounds how long `Waiting` may last; `Some(0)` times
    /// out on the first chunk that is not an onset, `None` waits forever.
    /// Chunks fed to a terminal session are ignored.
    pub fn feed(
        &mut self,
        samples: &[f32],
        target_samples: usize,
        max_delay_samples: Option<usize>,
    ) -> Phase {
        match self.phase {
            Phase::Waiting => self.feed_waiting(samples, max_delay_samples),
            Phase::Recording => self.feed_recording(samples, target_samples),
            Phase::Finished | Phase::Timeout => {}
        }
        self.phase
    }

    fn feed_waiting(&mut self, samples: &[f32], max_delay_samples: Option<usize>) {
        self.delay += samples.len();
        let decision = self.detector.observe(samples, self.delay);
        if decision.is_onset() {
            info!(
                delay_samples = self.delay,
                floor = ?self.detector.noise_floor(),
                "speech onset detected, recording"
            );
            self.phase = Phase::Recording;
            return;
        }
        if decision == OnsetDecision::Calibrating {
            debug!(floor = ?self.detector.noise_floor(), "noise floor calibrated");
        }

        // Silent input keeps recalibrating; the deadline still applies.
        if let Some(max_delay) = max_delay_samples {
            if self.delay > max_delay {
                info!(
                    delay_samples = self.delay,
                    max_delay, "no speech before max delay, timing out"
                );
                self.phase = Phase::Timeout;
            }
        }
    }

    fn feed_recording(&mut self, samples: &[f32], target_samples: usize) {
        self.recording.extend_from_slice(samples);
        if self.recording.len() >= target_samples {
            self.recording.truncate(target_samples);
            info!(samples = self.recording.len(), "recording finished");
            self.phase = Phase::Finished;
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Samples recorded so far (final once the phase is `Finished`).
    pub fn recording(&self) -> &[f32] {
        &self.recording
    }

    /// Samples waited so far.
    pub fn delay_samples(&self) -> usize {
        self.delay
    }

    pub fn noise_floor(&self) -> Option<f32> {
        self.detector.noise_floor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: usize = 8_820;
    const CHUNK: usize = 441; // 50 ms
    const QUIET: f32 = 0.002;

    fn session() -> RecordingSession {
        RecordingSession::new(OnsetDetector::new(RATE / 10, 30.0, RATE / 5))
    }

    fn quiet() -> Vec<f32> {
        (0..CHUNK)
            .map(|i| if i % 2 == 0 { QUIET } else { -QUIET })
            .collect()
    }

    fn loud(value: f32) -> Vec<f32> {
        vec![value; CHUNK]
    }

    /// Feed quiet chunks until the warm-up has passed.
    fn warmed_up(s: &mut RecordingSession) {
        for _ in 0..4 {
            assert_eq!(s.feed(&quiet(), RATE, None), Phase::Waiting);
        }
        assert!(s.delay_samples() > RATE / 10);
    }

    #[test]
    fn stays_waiting_inside_warmup() {
        let mut s = session();
        // 0.05 s of quiet input, in small chunks
        for _ in 0..5 {
            s.feed(&vec![QUIET; 88], RATE, None);
        }
        assert_eq!(s.phase(), Phase::Waiting);
        assert!(s.recording().is_empty());
    }

    #[test]
    fn loud_chunk_inside_warmup_does_not_trigger() {
        let mut s = session();
        s.feed(&quiet(), RATE, None);
        assert_eq!(s.feed(&loud(0.5), RATE, None), Phase::Waiting);
    }

    #[test]
    fn onset_chunk_is_not_recorded() {
        let mut s = session();
        warmed_up(&mut s);

        let trigger = loud(QUIET * 40.0);
        assert_eq!(s.feed(&trigger, RATE, None), Phase::Recording);
        assert!(s.recording().is_empty(), "trigger chunk must not be recorded");

        let next = loud(0.3);
        s.feed(&next, RATE, None);
        assert_eq!(s.recording(), next.as_slice());
    }

    #[test]
    fn times_out_after_max_delay() {
        let mut s = session();
        let mut phase = Phase::Waiting;
        let mut fed = 0;
        while phase == Phase::Waiting {
            phase = s.feed(&quiet(), RATE, Some(RATE));
            fed += CHUNK;
            assert!(fed <= 2 * RATE, "never timed out");
        }
        assert_eq!(phase, Phase::Timeout);
        assert!(fed > RATE);
        assert!(fed - CHUNK <= RATE);
        assert!(s.recording().is_empty());
    }

    #[test]
    fn hiss_after_digital_silence_keeps_waiting() {
        let mut s = session();
        // Longer than the warm-up, all zeros.
        for _ in 0..3 {
            assert_eq!(s.feed(&[0.0; CHUNK], RATE, None), Phase::Waiting);
        }
        let hiss: Vec<f32> = (0..CHUNK)
            .map(|i| if i % 2 == 0 { 0.0005 } else { -0.0005 })
            .collect();
        for _ in 0..10 {
            assert_eq!(s.feed(&hiss, RATE, None), Phase::Waiting);
        }
        assert!(s.recording().is_empty());
        assert!(s.noise_floor().unwrap() > 0.0);
    }

    #[test]
    fn digital_silence_still_times_out() {
        let mut s = session();
        let mut phase = Phase::Waiting;
        let mut fed = 0;
        while phase == Phase::Waiting {
            phase = s.feed(&[0.0; CHUNK], RATE, Some(RATE));
            fed += CHUNK;
            assert!(fed <= 2 * RATE, "never timed out");
        }
        assert_eq!(phase, Phase::Timeout);
        assert_eq!(s.delay_samples(), RATE + CHUNK);
    }

    #[test]
    fn zero_max_delay_times_out_on_first_chunk() {
        let mut s = session();
        assert_eq!(s.feed(&quiet(), RATE, Some(0)), Phase::Timeout);
    }

    #[test]
    fn no_timeout_without_max_delay() {
        let mut s = session();
        for _ in 0..200 {
            s.feed(&quiet(), RATE, None);
        }
        assert_eq!(s.phase(), Phase::Waiting);
    }

    #[test]
    fn finishes_at_exact_target() {
        let mut s = session();
        warmed_up(&mut s);
        s.feed(&loud(0.5), 3 * CHUNK, None);

        assert_eq!(s.feed(&loud(0.3), 3 * CHUNK, None), Phase::Recording);
        assert_eq!(s.feed(&loud(0.3), 3 * CHUNK, None), Phase::Recording);
        assert_eq!(s.feed(&loud(0.3), 3 * CHUNK, None), Phase::Finished);
        assert_eq!(s.recording().len(), 3 * CHUNK);
    }

    #[test]
    fn overshoot_is_truncated_to_target() {
        let mut s = session();
        warmed_up(&mut s);
        s.feed(&loud(0.5), 1_000, None);

        s.feed(&loud(0.3), 1_000, None);
        s.feed(&loud(0.3), 1_000, None);
        assert_eq!(s.feed(&loud(0.3), 1_000, None), Phase::Finished);
        assert_eq!(s.recording().len(), 1_000);
    }

    #[test]
    fn terminal_phase_ignores_further_chunks() {
        let mut s = session();
        warmed_up(&mut s);
        s.feed(&loud(0.5), CHUNK, None);
        assert_eq!(s.feed(&loud(0.3), CHUNK, None), Phase::Finished);
        assert_eq!(s.feed(&loud(0.9), CHUNK, None), Phase::Finished);
        assert!(s.recording().iter().all(|v| *v == 0.3));
    }

    #[test]
    fn reset_returns_to_waiting() {
        let mut s = session();
        warmed_up(&mut s);
        s.feed(&loud(0.5), CHUNK, None);
        s.feed(&loud(0.3), CHUNK, None);
        s.reset();
        assert_eq!(s.phase(), Phase::Waiting);
        assert_eq!(s.delay_samples(), 0);
        assert!(s.recording().is_empty());
        assert!(s.noise_floor().is_none());
    }
}
