//! Microphone capture via cpal.
//!
//! # Callback contract
//!
//! The cpal input callback runs on a driver-owned thread that the poll loop
//! does not control. Its only job is copy-and-enqueue: convert the driver's
//! frames to mono f32, wrap them in a [`SampleChunk`], and push the chunk into
//! the capture buffer. It never blocks and never touches session state.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on some hosts (COM on Windows, CoreAudio on
//! macOS). Create and drop a `DeviceStream` on the same thread.

pub mod device;
pub mod dump;
pub mod reference;
pub mod resample;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, Sample, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig,
    SupportedStreamConfig,
};

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tracing::info;
#[cfg(feature = "audio-cpal")]
use tracing::{error, warn};

use crate::buffering::ChunkProducer;
#[cfg(feature = "audio-cpal")]
use crate::buffering::chunk::SampleChunk;
use crate::error::{BirdcallError, Result};

/// Rate the reference material is mastered at.
pub const NATIVE_SAMPLE_RATE: u32 = 44_100;

/// Fixed decimation factor from the native rate to the engine rate.
pub const DECIMATION: u32 = 5;

/// Engine sample rate (Hz). Everything downstream of the capture buffer
/// runs at this rate.
pub const SAMPLE_RATE: u32 = NATIVE_SAMPLE_RATE / DECIMATION;

/// Whole samples in `secs` at `sample_rate`, rounded to nearest.
pub fn secs_to_samples(secs: f32, sample_rate: u32) -> usize {
    (secs as f64 * sample_rate as f64).round().max(0.0) as usize
}

/// Most recent error reported by the driver's error callback.
type ErrorSlot = Arc<Mutex<Option<String>>>;

/// Handle to an open input stream.
///
/// Dropping the handle stops delivery and releases the device.
pub struct DeviceStream {
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    /// Cleared on close; the callback discards anything it receives afterwards.
    running: Arc<AtomicBool>,
    last_error: ErrorSlot,
    device_name: String,
    /// Rate the device actually delivers (Hz).
    pub sample_rate: u32,
    /// Channel count the device delivers before the mono downmix.
    pub channels: u16,
}

impl DeviceStream {
    /// Open input device `device_id` (index into [`device::list_input_devices`])
    /// or the default input device, and start pushing chunks into `producer`.
    ///
    /// # Errors
    /// `DeviceUnavailable` when no matching input device exists or it exposes
    /// no usable config; `AudioStream` when cpal fails to build or start the
    /// stream.
    #[cfg(feature = "audio-cpal")]
    pub fn open(producer: ChunkProducer, device_id: Option<usize>) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_id {
            Some(id) => host
                .input_devices()
                .map_err(|e| BirdcallError::DeviceUnavailable(e.to_string()))?
                .nth(id)
                .ok_or_else(|| {
                    BirdcallError::DeviceUnavailable(format!("no input device with id {id}"))
                })?,
            None => host.default_input_device().ok_or_else(|| {
                BirdcallError::DeviceUnavailable("no default input device".into())
            })?,
        };

        let device_name = device.name().unwrap_or_else(|_| "unknown".into());
        let supported = select_config(&device)?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        let sample_format = supported.sample_format();

        info!(
            device = device_name.as_str(),
            sample_rate,
            channels,
            ?sample_format,
            "opening input device"
        );

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let running = Arc::new(AtomicBool::new(true));
        let last_error: ErrorSlot = Arc::new(Mutex::new(None));
        let sink = CallbackSink {
            producer,
            running: Arc::clone(&running),
            channels: channels as usize,
            sample_rate,
        };

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, sink, &last_error),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, sink, &last_error),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, sink, &last_error),
            SampleFormat::I32 => build_stream::<i32>(&device, &config, sink, &last_error),
            SampleFormat::I8 => build_stream::<i8>(&device, &config, sink, &last_error),
            SampleFormat::U8 => build_stream::<u8>(&device, &config, sink, &last_error),
            fmt => {
                return Err(BirdcallError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| BirdcallError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            last_error,
            device_name,
            sample_rate,
            channels,
        })
    }

    /// Stop delivery. Idempotent; the device itself is released on drop.
    pub fn close(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!(device = self.device_name.as_str(), "input stream closed");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Last error the driver reported for this stream, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl Drop for DeviceStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DeviceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStream")
            .field("device_name", &self.device_name)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl DeviceStream {
    pub fn open(_producer: ChunkProducer, _device_id: Option<usize>) -> Result<Self> {
        Err(BirdcallError::DeviceUnavailable(
            "compiled without audio-cpal feature".into(),
        ))
    }
}

/// Prefer a config that runs at the engine rate (mono first), then fall back
/// to the device default at its native rate.
#[cfg(feature = "audio-cpal")]
fn select_config(device: &cpal::Device) -> Result<SupportedStreamConfig> {
    let target = SampleRate(SAMPLE_RATE);

    match device.supported_input_configs() {
        Ok(configs) => {
            let native = configs
                .filter(|c| c.min_sample_rate() <= target && target <= c.max_sample_rate())
                .min_by_key(|c| c.channels());
            if let Some(range) = native {
                return Ok(range.with_sample_rate(target));
            }
        }
        Err(e) => warn!("failed to query supported input configs: {e}"),
    }

    let fallback = device
        .default_input_config()
        .map_err(|e| BirdcallError::DeviceUnavailable(e.to_string()))?;
    warn!(
        native_rate = fallback.sample_rate().0,
        engine_rate = SAMPLE_RATE,
        "device cannot run at the engine rate, capture will be resampled"
    );
    Ok(fallback)
}

/// Everything the callback owns.
#[cfg(feature = "audio-cpal")]
struct CallbackSink {
    producer: ChunkProducer,
    running: Arc<AtomicBool>,
    channels: usize,
    sample_rate: u32,
}

#[cfg(feature = "audio-cpal")]
impl CallbackSink {
    /// Copy one driver buffer into a mono chunk and enqueue it.
    fn deliver<T>(&self, data: &[T])
    where
        T: Sample,
        f32: FromSample<T>,
    {
        if !self.running.load(Ordering::Relaxed) {
            return;
        }
        let samples: Vec<f32> = if self.channels <= 1 {
            data.iter().map(|s| f32::from_sample(*s)).collect()
        } else {
            let ch = self.channels;
            data.chunks_exact(ch)
                .map(|frame| frame.iter().map(|s| f32::from_sample(*s)).sum::<f32>() / ch as f32)
                .collect()
        };
        if !samples.is_empty() {
            self.producer.push(SampleChunk::new(samples, self.sample_rate));
        }
    }
}

#[cfg(feature = "audio-cpal")]
fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    sink: CallbackSink,
    last_error: &ErrorSlot,
) -> Result<Stream>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let last_error = Arc::clone(last_error);
    device
        .build_input_stream(
            config,
            move |data: &[T], _info: &cpal::InputCallbackInfo| sink.deliver(data),
            move |err| {
                error!("audio stream error: {err}");
                *last_error.lock() = Some(err.to_string());
            },
            None,
        )
        .map_err(|e| BirdcallError::AudioStream(e.to_string()))
}
