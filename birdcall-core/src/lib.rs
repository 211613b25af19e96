//! # birdcall-core
//!
//! Acoustic capture-and-matching engine: listen for a player answering a bird
//! call, record the answer, and score how closely it mimics the reference.
//!
//! ## Architecture
//!
//! ```text
//! Microphone → DeviceStream (driver thread, copy-and-enqueue)
//!                  │
//!            CaptureBuffer (unbounded FIFO)
//!                  │
//!   MimicEngine::poll (caller's tick) → RecordingSession: Waiting → Recording → Finished | Timeout
//!                  │
//!   SpectralTransform → Spectrogram ─┐
//!   reference WAV → Spectrogram ─────┴─► similarity::compare → score
//! ```
//!
//! Nothing past the capture buffer runs on the driver thread.

#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod engine;
pub mod error;
pub mod grading;
pub mod spectral;
pub mod vad;

// Convenience re-exports for downstream crates
pub use audio::device::{list_input_devices, DeviceInfo};
pub use audio::reference::ReferenceCall;
pub use audio::SAMPLE_RATE;
pub use buffering::chunk::SampleChunk;
pub use engine::{EngineConfig, MimicEngine, Phase};
pub use error::BirdcallError;
pub use grading::{grade, Feedback, Verdict};
pub use spectral::Spectrogram;
