//! `MimicEngine` — the single owner of capture, session and analysis state.
//!
//! ## Lifecycle
//!
//! ```text
//! MimicEngine::new()
//!     └─► open(device?)         → input stream pushing chunks into the buffer
//!         └─► start()           → buffer cleared, session = Waiting
//!             └─► poll(..)*     → Waiting → Recording → Finished | Timeout
//!                 └─► transform + compare against a reference
//!     close() / drop            → stream stopped and device released
//! ```
//!
//! ## Threading
//!
//! Only the capture buffer (and the stream's running flag and error slot) is
//! shared with the driver thread. Everything else lives on the thread that
//! owns the engine, and `poll` never blocks: it drains whatever is queued and
//! returns. Because `cpal::Stream` may be `!Send`, an engine with an open
//! stream should stay on the thread that opened it.

pub mod session;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    audio::{
        reference::{self, ReferenceCall},
        resample::{RateConverter, DEFAULT_CHUNK_SIZE},
        secs_to_samples, DeviceStream, SAMPLE_RATE,
    },
    buffering::{chunk::SampleChunk, CaptureBuffer, ChunkProducer},
    error::Result,
    spectral::{similarity, SpectralTransform, Spectrogram},
    vad::OnsetDetector,
};

pub use session::{Phase, RecordingSession};

/// Tunables for detection, analysis and recording length.
///
/// Scores are only comparable between runs that share these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct EngineConfig {
    /// Waiting time before an onset may fire (s). Default: 0.1.
    pub warmup_secs: f32,
    /// Volume / noise-floor ratio that counts as speech. Default: 30.
    pub onset_ratio: f32,
    /// Longest moving-average window for the noise floor (s). Default: 0.2.
    pub noise_floor_window_secs: f32,
    /// Spectrogram hop (s). Default: 0.01.
    pub time_step_secs: f32,
    /// Spectrogram bin spacing (Hz); sets the analysis window. Default: 4.
    pub freq_step_hz: f32,
    /// Frequency smoothing width (Hz). Default: 200.
    pub freq_smoothing_hz: f32,
    /// Time smoothing width (s). Default: 0.2.
    pub time_smoothing_secs: f32,
    /// Extra recording time on top of the reference duration (s). Default: 0.5.
    pub recording_padding_secs: f32,
    /// Input block size for the capture resampler. Default: 1024.
    pub resampler_chunk_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            warmup_secs: 0.1,
            onset_ratio: 30.0,
            noise_floor_window_secs: 0.2,
            time_step_secs: 0.01,
            freq_step_hz: 4.0,
            freq_smoothing_hz: 200.0,
            time_smoothing_secs: 0.2,
            recording_padding_secs: 0.5,
            resampler_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

pub struct MimicEngine {
    config: EngineConfig,
    buffer: CaptureBuffer,
    stream: Option<DeviceStream>,
    /// Present while the open stream runs at a rate other than `SAMPLE_RATE`.
    converter: Option<RateConverter>,
    session: RecordingSession,
    transform: SpectralTransform,
}

impl MimicEngine {
    /// Create an engine. No device is opened until `open`.
    pub fn new(config: EngineConfig) -> Self {
        let session = RecordingSession::new(OnsetDetector::from_config(SAMPLE_RATE, &config));
        let transform = SpectralTransform::from_config(SAMPLE_RATE, &config);
        Self {
            config,
            buffer: CaptureBuffer::new(),
            stream: None,
            converter: None,
            session,
            transform,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Engine sample rate (Hz).
    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    // ── Device stream ────────────────────────────────────────────────────────

    /// Open input device `device_id`, or the default device.
    ///
    /// An already-open stream is closed first. On failure the engine stays
    /// closed and the caller may retry later.
    ///
    /// # Errors
    /// `DeviceUnavailable` / `AudioStream` when no usable input exists,
    /// `Resampler` when the device rate cannot be converted.
    pub fn open(&mut self, device_id: Option<usize>) -> Result<()> {
        self.close();

        let stream = match DeviceStream::open(self.buffer.producer(), device_id) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(?device_id, "failed to open input device: {e}");
                return Err(e);
            }
        };

        if stream.sample_rate != SAMPLE_RATE {
            self.converter = Some(RateConverter::new(
                stream.sample_rate,
                SAMPLE_RATE,
                self.config.resampler_chunk_size,
            )?);
        }

        info!(
            device = stream.device_name(),
            capture_rate = stream.sample_rate,
            "engine listening on input device"
        );
        self.stream = Some(stream);
        Ok(())
    }

    /// Release the input device. Safe to call at any time, any number of times.
    ///
    /// Audio still queued from the stream is discarded with it.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
        self.converter = None;
        let dropped = self.buffer.clear();
        if dropped > 0 {
            debug!(dropped_chunks = dropped, "discarded queued audio on close");
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Last error the driver reported on the open stream.
    pub fn stream_error(&self) -> Option<String> {
        self.stream.as_ref().and_then(DeviceStream::last_error)
    }

    /// Producer handle for the capture buffer, for feeding chunks from a
    /// source other than the device stream.
    pub fn capture_buffer(&self) -> ChunkProducer {
        self.buffer.producer()
    }

    // ── Recording ────────────────────────────────────────────────────────────

    /// Begin a new attempt: drop queued audio and reset the session to `Waiting`.
    pub fn start(&mut self) {
        let dropped = self.buffer.clear();
        if let Some(converter) = self.converter.as_mut() {
            converter.reset();
        }
        self.session.reset();
        debug!(dropped_chunks = dropped, "recording session started");
    }

    /// Drain queued chunks into the session and report where it stands.
    ///
    /// Returns as soon as the queue is empty or the session reaches a terminal
    /// phase. Chunks arriving after a terminal phase are discarded. Keep
    /// calling this once per tick; it never waits for audio.
    pub fn poll(
        &mut self,
        target_samples: usize,
        max_delay_samples: Option<usize>,
    ) -> (Phase, &[f32]) {
        while let Some(chunk) = self.buffer.try_pop() {
            if self.session.phase().is_terminal() {
                continue;
            }
            let Some(samples) = self.to_engine_rate(chunk) else {
                continue;
            };
            if self
                .session
                .feed(&samples, target_samples, max_delay_samples)
                .is_terminal()
            {
                break;
            }
        }
        (self.session.phase(), self.session.recording())
    }

    fn to_engine_rate(&mut self, chunk: SampleChunk) -> Option<Vec<f32>> {
        let samples = match self.converter.as_mut() {
            Some(converter) if converter.capture_rate() == chunk.sample_rate => {
                converter.process(&chunk.samples)
            }
            _ if chunk.sample_rate == SAMPLE_RATE => chunk.samples,
            // A callback that raced `close` can still deliver at the old rate.
            _ => {
                debug!(
                    chunk_rate = chunk.sample_rate,
                    "dropping chunk at unexpected sample rate"
                );
                return None;
            }
        };
        (!samples.is_empty()).then_some(samples)
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    /// Samples recorded in the current attempt.
    pub fn recording(&self) -> &[f32] {
        self.session.recording()
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    // ── Analysis ─────────────────────────────────────────────────────────────

    /// Smoothed magnitude spectrogram of engine-rate samples.
    pub fn transform(&self, samples: &[f32]) -> Spectrogram {
        self.transform.transform(samples)
    }

    /// Similarity score of two spectrograms (0.0 if either is silent).
    pub fn compare(&self, a: &Spectrogram, b: &Spectrogram) -> f32 {
        similarity::compare(a, b)
    }

    /// Decode and transform a reference call from a WAV file.
    pub fn load_reference(&self, path: &Path) -> Result<ReferenceCall> {
        reference::load_reference(path, &self.transform)
    }

    pub fn spectral_transform(&self) -> &SpectralTransform {
        &self.transform
    }

    // ── Unit helpers ─────────────────────────────────────────────────────────

    pub fn secs_to_samples(&self, secs: f32) -> usize {
        secs_to_samples(secs, SAMPLE_RATE)
    }

    /// Recording length for mimicking a reference of `reference_secs`,
    /// padded by `recording_padding_secs` to absorb detection latency.
    pub fn target_samples(&self, reference_secs: f32) -> usize {
        self.secs_to_samples(reference_secs + self.config.recording_padding_secs)
    }
}

impl Default for MimicEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Drop for MimicEngine {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for MimicEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MimicEngine")
            .field("stream", &self.stream)
            .field("phase", &self.session.phase())
            .field("recorded", &self.session.recording().len())
            .field("queued", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(value: f32, len: usize) -> SampleChunk {
        SampleChunk::new(vec![value; len], SAMPLE_RATE)
    }

    #[test]
    fn defaults_target_and_units() {
        let engine = MimicEngine::default();
        assert_eq!(engine.sample_rate(), 8_820);
        assert_eq!(engine.secs_to_samples(1.0), 8_820);
        assert_eq!(engine.target_samples(1.5), 17_640);
    }

    #[test]
    fn close_is_idempotent_without_open() {
        let mut engine = MimicEngine::default();
        engine.close();
        engine.close();
        assert!(!engine.is_open());
        assert!(engine.stream_error().is_none());
    }

    #[test]
    fn poll_with_no_audio_stays_waiting() {
        let mut engine = MimicEngine::default();
        engine.start();
        let (phase, recording) = engine.poll(8_820, Some(8_820));
        assert_eq!(phase, Phase::Waiting);
        assert!(recording.is_empty());
    }

    #[test]
    fn start_discards_stale_chunks() {
        let mut engine = MimicEngine::default();
        let producer = engine.capture_buffer();
        for _ in 0..10 {
            producer.push(chunk(0.5, 441));
        }
        engine.start();
        engine.poll(8_820, None);
        assert_eq!(engine.session().delay_samples(), 0);
    }

    #[test]
    fn terminal_poll_leaves_rest_queued_then_discards() {
        let mut engine = MimicEngine::default();
        let producer = engine.capture_buffer();
        engine.start();
        // 21 quiet chunks time out at 1 s; the 22nd stays queued
        for _ in 0..22 {
            producer.push(chunk(0.001, 441));
        }
        assert_eq!(engine.poll(8_820, Some(8_820)).0, Phase::Timeout);
        assert_eq!(engine.buffer.len(), 1);
        assert_eq!(engine.poll(8_820, Some(8_820)).0, Phase::Timeout);
        assert!(engine.buffer.is_empty());
    }

    fn capture_chunk(rate: u32, len: usize) -> SampleChunk {
        let samples = (0..len)
            .map(|i| if i % 2 == 0 { 0.01 } else { -0.01 })
            .collect();
        SampleChunk::new(samples, rate)
    }

    #[test]
    fn poll_converts_capture_rate_chunks() {
        let mut engine = MimicEngine::default();
        engine.converter = Some(RateConverter::new(48_000, SAMPLE_RATE, 960).unwrap());
        engine.start();

        engine.capture_buffer().push(capture_chunk(48_000, 960 * 10));
        assert_eq!(engine.poll(8_820, None).0, Phase::Waiting);
        // 9600 samples at 48 kHz ≈ 1764 at the engine rate
        let delay = engine.session().delay_samples() as isize;
        assert!((delay - 1_764).abs() <= 40, "delay={delay}");
    }

    #[test]
    fn start_resets_converter() {
        let mut engine = MimicEngine::default();
        engine.converter = Some(RateConverter::new(48_000, SAMPLE_RATE, 960).unwrap());
        engine.start();

        // Less than one resampler block: held back, nothing reaches the session.
        engine.capture_buffer().push(capture_chunk(48_000, 900));
        engine.poll(8_820, None);
        assert_eq!(engine.session().delay_samples(), 0);

        engine.start();
        engine.capture_buffer().push(capture_chunk(48_000, 100));
        engine.poll(8_820, None);
        assert_eq!(engine.session().delay_samples(), 0);
    }

    #[test]
    fn close_discards_capture_rate_chunks() {
        let mut engine = MimicEngine::default();
        engine.converter = Some(RateConverter::new(48_000, SAMPLE_RATE, 1_024).unwrap());
        engine.start();
        let producer = engine.capture_buffer();

        producer.push(capture_chunk(48_000, 2_048));
        engine.poll(8_820, None);
        let delay = engine.session().delay_samples();
        producer.push(capture_chunk(48_000, 2_048));
        engine.close();

        assert!(engine.buffer.is_empty());
        assert_eq!(engine.poll(8_820, None).0, Phase::Waiting);
        assert_eq!(engine.session().delay_samples(), delay);
    }

    #[test]
    fn chunk_at_unknown_rate_is_dropped() {
        let mut engine = MimicEngine::default();
        engine.start();
        // Pushed after close, e.g. by a callback already in flight.
        engine.close();
        engine.capture_buffer().push(capture_chunk(48_000, 4_800));

        assert_eq!(engine.poll(8_820, None).0, Phase::Waiting);
        assert_eq!(engine.session().delay_samples(), 0);
        assert!(engine.buffer.is_empty());
    }

    #[test]
    fn config_fills_missing_fields_with_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{ "onsetRatio": 12.0 }"#).unwrap();
        assert_eq!(config.onset_ratio, 12.0);
        assert_eq!(config.warmup_secs, 0.1);
        assert_eq!(config.resampler_chunk_size, DEFAULT_CHUNK_SIZE);
    }
}
