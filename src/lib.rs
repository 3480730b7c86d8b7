//! SARA voice client - realtime voice sessions for the SARA assistant
//!
//! This library provides the core functionality for the SARA client:
//! - Realtime voice sessions (capture, wire codec, gapless playback)
//! - Session state tracking
//! - Chat and media generation clients
//!
//! # Architecture
//!
//! ```text
//! microphone ──▶ capture ──▶ codec ──▶ live channel ──▶ voice model
//!                                          │
//! speaker ◀── playback scheduler ◀── codec ┘
//!                    │
//!              state machine (idle / connecting / listening / speaking)
//! ```

pub mod channel;
pub mod chat;
pub mod config;
pub mod error;
pub mod media;
pub mod persona;
pub mod voice;

pub use channel::{ChannelEvent, LiveChannel, LiveConfig};
pub use chat::{ChatClient, ChatMessage};
pub use config::Config;
pub use error::{Error, Result};
pub use media::MediaClient;
pub use persona::Persona;
pub use voice::{
    AudioCapture, AudioFrame, CpalSpeaker, EncodedChunk, PlaybackScheduler, SessionState, Speaker,
    VoiceSession,
};
