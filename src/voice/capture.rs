//! Microphone capture pipeline
//!
//! Acquires the default input device at 16 kHz mono, chunks the stream into
//! fixed 4096-sample frames and forwards each frame to the session channel
//! task. Frames are fire-and-forget: a slow channel buffers or drops at the
//! transport layer, never here.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, Device, SampleRate, Stream, StreamConfig};
use tokio::sync::mpsc;

use crate::voice::codec::AudioFrame;
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz, the rate the voice model expects)
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Fixed capture frame size in samples (256ms at 16kHz)
pub const CAPTURE_FRAME_SAMPLES: usize = 4096;

/// Captures audio from the default input device
pub struct AudioCapture {
    #[allow(dead_code)]
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnavailable`] if no input device exists or
    /// none supports mono 16kHz
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("no input device".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(CAPTURE_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(CAPTURE_SAMPLE_RATE)
            })
            .ok_or_else(|| {
                Error::DeviceUnavailable("no mono 16kHz input config".to_string())
            })?;

        let config = supported_config
            .with_sample_rate(SampleRate(CAPTURE_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = CAPTURE_SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            stream: None,
        })
    }

    /// Start capturing, sending each full frame through `frames`
    ///
    /// Idempotent while a stream is active. Partial tail samples are held
    /// back until the next callback completes the frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] if the platform refuses access,
    /// [`Error::Audio`] for other stream failures
    pub fn start(&mut self, frames: mpsc::UnboundedSender<AudioFrame>) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let config = self.config.clone();
        let mut pending: Vec<f32> = Vec::with_capacity(CAPTURE_FRAME_SAMPLES * 2);

        let stream = self
            .device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    pending.extend_from_slice(data);
                    while pending.len() >= CAPTURE_FRAME_SAMPLES {
                        let rest = pending.split_off(CAPTURE_FRAME_SAMPLES);
                        let frame = AudioFrame::from_f32_mono(CAPTURE_SAMPLE_RATE, &pending);
                        pending = rest;
                        // Fire-and-forget; receiver gone means the session
                        // is tearing down and the frame is moot
                        let _ = frames.send(frame);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| match e {
                BuildStreamError::DeviceNotAvailable
                | BuildStreamError::StreamConfigNotSupported => {
                    Error::DeviceUnavailable(e.to_string())
                }
                // Platform permission refusals surface as backend errors
                BuildStreamError::BackendSpecific { err } => {
                    Error::PermissionDenied(err.to_string())
                }
                other => Error::Audio(other.to_string()),
            })?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!(frame_samples = CAPTURE_FRAME_SAMPLES, "audio capture started");
        Ok(())
    }

    /// Stop capturing and release the device; idempotent
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Get the sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        CAPTURE_SAMPLE_RATE
    }
}

/// Convert f32 samples to WAV bytes, used by `sara test-mic --dump`
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32768.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
