//! Realtime voice subsystem
//!
//! Microphone capture, PCM wire codec, the gapless playback scheduler and
//! the session state machine. The live transport lives in `channel.rs`.

pub mod codec;

mod capture;
mod playback;
mod session;
mod state;

pub use capture::{AudioCapture, CAPTURE_FRAME_SAMPLES, CAPTURE_SAMPLE_RATE, samples_to_wav};
pub use codec::{AudioFrame, EncodedChunk};
pub use playback::{
    CpalSpeaker, PLAYBACK_CHANNELS, PLAYBACK_SAMPLE_RATE, PlaybackScheduler, Scheduled, Speaker,
};
pub use session::VoiceSession;
pub use state::{SessionEvent, SessionState, StateMachine};
