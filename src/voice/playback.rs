//! Gapless playback scheduler
//!
//! Inbound chunks may arrive in bursts, faster or slower than real time.
//! The scheduler serializes them on the output device clock so each chunk
//! begins exactly when the previous one ends, and supports full
//! cancellation for barge-in and session teardown.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use tokio::sync::mpsc;

use crate::voice::codec::{self, AudioFrame, EncodedChunk};
use crate::{Error, Result};

/// Sample rate of synthesized audio from the voice model
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Synthesized audio is mono
pub const PLAYBACK_CHANNELS: u16 = 1;

/// Output device seam: a monotonic clock plus scheduled buffer playback
///
/// The real implementation is [`CpalSpeaker`]; tests drive the scheduler
/// with a fake to exercise timing without hardware.
pub trait Speaker {
    /// Current device clock in seconds
    fn now(&self) -> f64;

    /// Schedule `frame` to begin at device time `start`
    ///
    /// # Errors
    ///
    /// Returns error if the device rejects the buffer
    fn play_at(&self, id: u64, frame: &AudioFrame, start: f64) -> Result<()>;

    /// Stop and discard the given in-flight buffers; no completion
    /// notifications may fire for them afterwards
    fn cancel(&self, ids: &[u64]);
}

/// A successfully scheduled playback unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scheduled {
    /// Device-assigned unit id
    pub id: u64,
    /// Device-clock start time in seconds
    pub start: f64,
    /// Buffer duration in seconds
    pub duration: f64,
}

/// Schedules inbound chunks for gapless sequential playback
///
/// One instance per active session; the next-start cursor and in-flight
/// set are owned here exclusively and only touched from the session task.
pub struct PlaybackScheduler<S: Speaker> {
    speaker: S,
    next_start: f64,
    in_flight: HashSet<u64>,
    next_id: u64,
}

impl<S: Speaker> PlaybackScheduler<S> {
    /// Create a scheduler with the cursor at the device's current time
    pub fn new(speaker: S) -> Self {
        let next_start = speaker.now();
        Self {
            speaker,
            next_start,
            in_flight: HashSet::new(),
            next_id: 0,
        }
    }

    /// Decode `chunk` and schedule it directly after any pending audio
    ///
    /// The `max` against the device clock guards against a cursor that fell
    /// behind real time during an idle gap; without it a stale cursor would
    /// schedule playback in the past.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for a malformed chunk, leaving the cursor
    /// and in-flight set untouched so one bad chunk cannot silence the
    /// rest of the stream
    pub fn schedule(&mut self, chunk: &EncodedChunk) -> Result<Scheduled> {
        let frame = codec::decode(chunk, PLAYBACK_SAMPLE_RATE, PLAYBACK_CHANNELS)?;

        let start = self.next_start.max(self.speaker.now());
        let duration = frame.duration();
        let id = self.next_id;

        self.speaker.play_at(id, &frame, start)?;

        self.next_id += 1;
        self.in_flight.insert(id);
        self.next_start = start + duration;

        tracing::trace!(id, start, duration, "scheduled playback unit");
        Ok(Scheduled {
            id,
            start,
            duration,
        })
    }

    /// Record a device completion callback for `id`
    ///
    /// Returns `true` exactly when the in-flight set drains to empty; the
    /// session uses that single signal to flip speaking back to listening.
    pub fn on_finished(&mut self, id: u64) -> bool {
        self.in_flight.remove(&id) && self.in_flight.is_empty()
    }

    /// Stop every in-flight unit and reset the cursor to the device clock
    ///
    /// Used on barge-in and session close; guarantees no stale audio
    /// continues playing afterwards.
    pub fn cancel_all(&mut self) {
        if !self.in_flight.is_empty() {
            let ids: Vec<u64> = self.in_flight.drain().collect();
            tracing::debug!(cancelled = ids.len(), "cancelling in-flight playback");
            self.speaker.cancel(&ids);
        }
        self.next_start = self.speaker.now();
    }

    /// Number of units currently in flight
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Current next-start cursor (seconds on the device clock)
    #[must_use]
    pub const fn next_start(&self) -> f64 {
        self.next_start
    }
}

/// A buffer queued on the real output device
struct QueuedBuffer {
    id: u64,
    samples: Vec<f32>,
    start_frame: u64,
    pos: usize,
}

/// Plays scheduled buffers on the default output device via cpal
///
/// The device clock is the count of rendered output frames divided by the
/// sample rate; buffers begin when the render position crosses their start
/// frame and completion ids are posted back over an unbounded channel.
pub struct CpalSpeaker {
    #[allow(dead_code)]
    device: Device,
    _stream: Stream,
    queue: Arc<Mutex<Vec<QueuedBuffer>>>,
    rendered_frames: Arc<AtomicU64>,
}

impl CpalSpeaker {
    /// Open the default output device at 24kHz
    ///
    /// Prefers mono; falls back to stereo fan-out. Finished unit ids are
    /// sent through `finished`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnavailable`] if no suitable output device
    /// exists, [`Error::Audio`] if the stream cannot be started
    pub fn new(finished: mpsc::UnboundedSender<u64>) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::DeviceUnavailable("no output device".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: stereo, fanning the mono signal out per frame
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| {
                Error::DeviceUnavailable("no 24kHz output config".to_string())
            })?;

        let config: StreamConfig = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();
        let channels = config.channels as usize;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels,
            "audio output initialized"
        );

        let queue: Arc<Mutex<Vec<QueuedBuffer>>> = Arc::new(Mutex::new(Vec::new()));
        let rendered_frames = Arc::new(AtomicU64::new(0));

        let cb_queue = Arc::clone(&queue);
        let cb_frames = Arc::clone(&rendered_frames);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let base = cb_frames.load(Ordering::Acquire);
                    let frames = (data.len() / channels) as u64;

                    let Ok(mut bufs) = cb_queue.lock() else {
                        data.fill(0.0);
                        return;
                    };

                    for (i, out) in data.chunks_mut(channels).enumerate() {
                        let abs = base + i as u64;
                        let mut sample = 0.0f32;
                        for buf in bufs.iter_mut() {
                            if abs >= buf.start_frame && buf.pos < buf.samples.len() {
                                sample += buf.samples[buf.pos];
                                buf.pos += 1;
                            }
                        }
                        for channel in out.iter_mut() {
                            *channel = sample;
                        }
                    }

                    cb_frames.store(base + frames, Ordering::Release);

                    bufs.retain(|buf| {
                        if buf.pos >= buf.samples.len() {
                            let _ = finished.send(buf.id);
                            false
                        } else {
                            true
                        }
                    });
                },
                |err| {
                    tracing::error!(error = %err, "audio output error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        Ok(Self {
            device,
            _stream: stream,
            queue,
            rendered_frames,
        })
    }
}

impl Speaker for CpalSpeaker {
    fn now(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let frames = self.rendered_frames.load(Ordering::Acquire) as f64;
        frames / f64::from(PLAYBACK_SAMPLE_RATE)
    }

    fn play_at(&self, id: u64, frame: &AudioFrame, start: f64) -> Result<()> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let start_frame = (start * f64::from(PLAYBACK_SAMPLE_RATE)).round() as u64;

        let mut queue = self
            .queue
            .lock()
            .map_err(|_| Error::Audio("output queue poisoned".to_string()))?;
        queue.push(QueuedBuffer {
            id,
            samples: frame.to_f32(),
            start_frame,
            pos: 0,
        });
        Ok(())
    }

    fn cancel(&self, ids: &[u64]) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.retain(|buf| !ids.contains(&buf.id));
        }
    }
}
