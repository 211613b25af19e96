use std::path::PathBuf;

use thiserror::Error;

/// All errors produced by birdcall-core.
#[derive(Debug, Error)]
pub enum BirdcallError {
    /// No compatible input device. Recoverable: the caller may retry `open`.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("failed to load reference call {path}: {reason}")]
    ReferenceLoad { path: PathBuf, reason: String },

    #[error("resampler error: {0}")]
    Resampler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BirdcallError {
    /// Whether retrying `open` later can reasonably succeed.
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            BirdcallError::DeviceUnavailable(_) | BirdcallError::AudioStream(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BirdcallError>;
