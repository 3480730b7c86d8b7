//! Shared helpers for integration tests

use std::cell::RefCell;
use std::rc::Rc;

use sara_voice::voice::codec::{self, AudioFrame, EncodedChunk};
use sara_voice::voice::{PLAYBACK_CHANNELS, PLAYBACK_SAMPLE_RATE, Speaker};

/// Generate sine wave audio samples
#[allow(dead_code)]
pub fn generate_sine_samples(
    sample_rate: u32,
    frequency: f32,
    duration_secs: f32,
    amplitude: f32,
) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// An encoded 24kHz mono chunk of the given duration
#[allow(dead_code)]
pub fn chunk_of_secs(secs: f64) -> EncodedChunk {
    let samples = (secs * f64::from(PLAYBACK_SAMPLE_RATE)).round() as usize;
    let frame =
        AudioFrame::new(PLAYBACK_SAMPLE_RATE, PLAYBACK_CHANNELS, vec![0; samples]).unwrap();
    codec::encode(&frame)
}

/// Speaker fake with a manually advanced clock and full playback records
#[derive(Clone, Default)]
pub struct FakeSpeaker {
    pub clock: Rc<RefCell<f64>>,
    pub played: Rc<RefCell<Vec<(u64, f64, f64)>>>,
    pub cancelled: Rc<RefCell<Vec<u64>>>,
}

#[allow(dead_code)]
impl FakeSpeaker {
    pub fn advance(&self, secs: f64) {
        *self.clock.borrow_mut() += secs;
    }

    /// Start times of every scheduled unit, in scheduling order
    pub fn starts(&self) -> Vec<f64> {
        self.played.borrow().iter().map(|&(_, s, _)| s).collect()
    }
}

impl Speaker for FakeSpeaker {
    fn now(&self) -> f64 {
        *self.clock.borrow()
    }

    fn play_at(&self, id: u64, frame: &AudioFrame, start: f64) -> sara_voice::Result<()> {
        self.played.borrow_mut().push((id, start, frame.duration()));
        Ok(())
    }

    fn cancel(&self, ids: &[u64]) {
        self.cancelled.borrow_mut().extend_from_slice(ids);
    }
}
