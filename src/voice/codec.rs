//! PCM wire codec
//!
//! Converts between raw 16-bit PCM frames and the base64-framed wire
//! encoding used by the live session channel.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::{Error, Result};

/// A buffer of interleaved 16-bit signed PCM samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count (1 = mono)
    pub channels: u16,
    /// Interleaved samples; length is a multiple of `channels`
    pub samples: Vec<i16>,
}

impl AudioFrame {
    /// Create a frame, validating the channel interleave invariant
    ///
    /// # Errors
    ///
    /// Returns error if `samples.len()` is not a multiple of `channels`
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<i16>) -> Result<Self> {
        if channels == 0 {
            return Err(Error::Decode("channel count must be positive".to_string()));
        }
        if samples.len() % usize::from(channels) != 0 {
            return Err(Error::Decode(format!(
                "sample count {} is not a multiple of {} channels",
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
            samples,
        })
    }

    /// Build a mono frame from captured f32 samples
    ///
    /// Scales [-1.0, 1.0] to i16 by multiplying by 32768 and truncating.
    /// The inverse divides by 32768; the asymmetry at the positive rail is
    /// required for bit-parity with the remote model's expected input.
    #[must_use]
    pub fn from_f32_mono(sample_rate: u32, input: &[f32]) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let samples = input.iter().map(|&s| (s * 32768.0) as i16).collect();
        Self {
            sample_rate,
            channels: 1,
            samples,
        }
    }

    /// Convert samples back to f32 in [-1.0, 1.0)
    #[must_use]
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| f32::from(s) / 32768.0).collect()
    }

    /// Playback duration in seconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> f64 {
        let frames = self.samples.len() / usize::from(self.channels);
        frames as f64 / f64::from(self.sample_rate)
    }
}

/// Wire representation of an [`AudioFrame`]: base64 payload plus a
/// MIME-like PCM rate tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    /// Base64-encoded little-endian 16-bit PCM bytes
    pub data: String,
    /// Rate tag, e.g. `audio/pcm;rate=16000`
    pub mime_type: String,
}

impl EncodedChunk {
    /// Build a chunk from a pre-encoded base64 payload at the given rate
    #[must_use]
    pub fn from_base64(data: String, sample_rate: u32) -> Self {
        Self {
            data,
            mime_type: pcm_mime(sample_rate),
        }
    }
}

/// MIME-like tag for raw PCM at a given rate
#[must_use]
pub fn pcm_mime(sample_rate: u32) -> String {
    format!("audio/pcm;rate={sample_rate}")
}

/// Serialize a frame to its wire encoding
///
/// Lossless and deterministic: little-endian i16 bytes, then base64.
#[must_use]
pub fn encode(frame: &AudioFrame) -> EncodedChunk {
    let mut bytes = Vec::with_capacity(frame.samples.len() * 2);
    for sample in &frame.samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    EncodedChunk {
        data: BASE64.encode(&bytes),
        mime_type: pcm_mime(frame.sample_rate),
    }
}

/// Reconstruct a frame from its wire encoding
///
/// # Errors
///
/// Returns [`Error::Decode`] if the payload is not valid base64 or the
/// decoded byte length is not a multiple of `channels * 2`
pub fn decode(chunk: &EncodedChunk, sample_rate: u32, channels: u16) -> Result<AudioFrame> {
    let bytes = BASE64
        .decode(&chunk.data)
        .map_err(|e| Error::Decode(format!("invalid base64: {e}")))?;

    let stride = usize::from(channels) * 2;
    if stride == 0 || bytes.len() % stride != 0 {
        return Err(Error::Decode(format!(
            "{} bytes is not a multiple of {} channels x 2",
            bytes.len(),
            channels
        )));
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    AudioFrame::new(sample_rate, channels, samples)
}
