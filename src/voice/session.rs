//! Voice session orchestrator
//!
//! Owns one session's capture pipeline, playback scheduler and state
//! machine, and pumps typed channel events through them on a single task.
//! All scheduler state is confined here; nothing else mutates it.

use tokio::sync::mpsc;

use crate::channel::{ChannelEvent, LiveChannel, LiveConfig};
use crate::config::Config;
use crate::voice::capture::AudioCapture;
use crate::voice::codec;
use crate::voice::playback::{CpalSpeaker, PlaybackScheduler};
use crate::voice::state::{SessionEvent, SessionState, StateMachine};
use crate::Result;

/// Drives one live voice session from connect to teardown
pub struct VoiceSession {
    state: StateMachine,
    last_transcript: String,
}

impl Default for VoiceSession {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceSession {
    /// Create a session in the idle state
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: StateMachine::new(),
            last_transcript: String::new(),
        }
    }

    /// Current session state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state.state()
    }

    /// Most recent output transcription
    #[must_use]
    pub fn last_transcript(&self) -> &str {
        &self.last_transcript
    }

    /// Run a session until the channel closes, errors, or ctrl-c
    ///
    /// Teardown order is fixed: stop capture, cancel all playback, then
    /// transition to idle, so no audio outlives the reported idle state.
    ///
    /// # Errors
    ///
    /// Returns error if the channel cannot be opened or an audio device
    /// cannot be acquired
    #[allow(clippy::future_not_send, clippy::too_many_lines)]
    pub async fn run(&mut self, config: &Config) -> Result<()> {
        self.state.apply(SessionEvent::OpenRequested);
        tracing::info!(model = %config.voice.model, "opening live session");

        let live = LiveConfig {
            url: config.live_url.clone(),
            api_key: config.require_api_key()?.to_string(),
            model: config.voice.model.clone(),
            voice: config.persona.voice.clone(),
            system_instruction: config.persona.live_instruction(),
        };

        let (channel, mut events) = match LiveChannel::connect(&live).await {
            Ok(pair) => pair,
            Err(e) => {
                self.state.apply(SessionEvent::Errored);
                return Err(e);
            }
        };

        let (finished_tx, mut finished) = mpsc::unbounded_channel();
        let devices = CpalSpeaker::new(finished_tx).and_then(|speaker| {
            let capture = AudioCapture::new()?;
            Ok((speaker, capture))
        });
        let (speaker, mut capture) = match devices {
            Ok(pair) => pair,
            // Device acquisition is fatal to starting; surface and go idle
            Err(e) => {
                channel.close();
                self.state.apply(SessionEvent::Errored);
                return Err(e);
            }
        };
        let mut scheduler = PlaybackScheduler::new(speaker);
        let (frame_tx, mut frames) = mpsc::unbounded_channel();

        let end_event = loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(ChannelEvent::Opened) => {
                        if let Err(e) = capture.start(frame_tx.clone()) {
                            tracing::error!(error = %e, "could not start capture");
                            channel.close();
                            scheduler.cancel_all();
                            self.state.apply(SessionEvent::Errored);
                            return Err(e);
                        }
                        self.state.apply(SessionEvent::Opened);
                        tracing::info!("session open, listening");
                    }
                    Some(ChannelEvent::Transcript(text)) => {
                        tracing::info!(transcript = %text, "model transcript");
                        self.last_transcript = text;
                    }
                    Some(ChannelEvent::Audio(chunk)) => match scheduler.schedule(&chunk) {
                        Ok(unit) => {
                            tracing::trace!(id = unit.id, start = unit.start, "audio scheduled");
                            self.state.apply(SessionEvent::AudioArrived);
                        }
                        // One bad chunk must not silence the stream
                        Err(e) => tracing::warn!(error = %e, "dropping undecodable chunk"),
                    },
                    Some(ChannelEvent::Closed) | None => break SessionEvent::Closed,
                    Some(ChannelEvent::Errored(e)) => {
                        tracing::error!(error = %e, "session channel failed");
                        break SessionEvent::Errored;
                    }
                },
                Some(frame) = frames.recv() => {
                    // Fire-and-forget; a send failure means the pump is
                    // gone and the close event is already on its way
                    if channel.send_audio(codec::encode(&frame)).is_err() {
                        tracing::debug!("dropping frame, channel closing");
                    }
                },
                Some(id) = finished.recv() => {
                    if scheduler.on_finished(id) {
                        self.state.apply(SessionEvent::Drained);
                        tracing::debug!("playback drained");
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupted, closing session");
                    channel.close();
                    break SessionEvent::Closed;
                },
            }
        };

        capture.stop();
        scheduler.cancel_all();
        self.state.apply(end_event);
        tracing::info!(state = %self.state.state(), "session ended");

        Ok(())
    }
}
