// src/backend.rs
//
// Pluggable audio device backend.
//
// Decouples the mixer from any concrete platform audio API, mirroring the
// adapter boundary a host shell would otherwise own. The default
// implementation wraps cpal; tests use a backend that never touches real
// hardware.

use thiserror::Error;

/// Errors raised by a concrete [`AudioBackend`] implementation.
///
/// Mapped to [`crate::error::ErrorCode::AudioDevice`] at the control
/// boundary — callers never see this type directly.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no output device available")]
    NoDevice,
    #[error("unsupported stream configuration: {0}")]
    UnsupportedConfig(String),
    #[error("stream error: {0}")]
    Stream(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Output stream configuration requested at `init` time.
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    pub sample_rate: u32,
    pub buffer_frames: u32,
    pub channels: u16,
}

/// Callback invoked once per device period with an interleaved stereo
/// output buffer to fill.
///
/// Runs on the realtime thread. Must not allocate, lock anything beyond
/// the Scene mutex, or perform I/O.
pub type MixCallback = Box<dyn FnMut(&mut [f32]) + Send>;

/// A live output stream. Dropping it stops playback.
pub struct Stream {
    _inner: Box<dyn Send>,
}

impl Stream {
    pub fn new<T: Send + 'static>(inner: T) -> Self {
        Self {
            _inner: Box::new(inner),
        }
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream").finish_non_exhaustive()
    }
}

/// Object-safe abstraction over a platform audio output device.
pub trait AudioBackend: Send {
    fn name(&self) -> &str;

    /// Open an output stream, handing ownership of the per-period buffer
    /// fill to `callback`.
    fn open_output_stream(
        &self,
        config: &StreamConfig,
        callback: MixCallback,
    ) -> BackendResult<Stream>;
}

/// cpal-backed concrete implementation, used by `init`/`shutdown` outside
/// of tests.
pub struct CpalBackend {
    host: cpal::Host,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open_output_stream(
        &self,
        config: &StreamConfig,
        mut callback: MixCallback,
    ) -> BackendResult<Stream> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let device = self
            .host
            .default_output_device()
            .ok_or(BackendError::NoDevice)?;

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(config.buffer_frames),
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    callback(data);
                },
                |err| log::error!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| BackendError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| BackendError::Stream(e.to_string()))?;

        Ok(Stream::new(stream))
    }
}
