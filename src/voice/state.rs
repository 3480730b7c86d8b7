//! Session state machine
//!
//! Tracks the lifecycle of one voice session. Transitions are driven
//! exclusively by channel lifecycle events, chunk arrival and the playback
//! drain signal; no other component may force a state change.

use std::fmt;

/// Lifecycle state of a voice session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No active session
    Idle,
    /// Session open requested, channel not yet ready
    Connecting,
    /// Channel ready, capture active, no pending playback
    Listening,
    /// One or more playback units in flight
    Speaking,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Listening => "listening",
            Self::Speaking => "speaking",
        };
        f.write_str(s)
    }
}

/// Events that may drive a state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session open was requested
    OpenRequested,
    /// Channel reported ready
    Opened,
    /// A playable chunk was scheduled
    AudioArrived,
    /// All in-flight playback finished
    Drained,
    /// Channel closed
    Closed,
    /// Channel errored
    Errored,
}

/// Applies the session transition table
#[derive(Debug)]
pub struct StateMachine {
    state: SessionState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Start in `Idle`
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Apply an event; returns the new state if it changed
    pub fn apply(&mut self, event: SessionEvent) -> Option<SessionState> {
        use SessionEvent as E;
        use SessionState as S;

        let next = match (self.state, event) {
            (S::Idle, E::OpenRequested) => S::Connecting,
            (S::Connecting, E::Opened) => S::Listening,
            (S::Listening, E::AudioArrived) => S::Speaking,
            (S::Speaking, E::Drained) => S::Listening,
            // Close and error collapse to idle from any state
            (_, E::Closed | E::Errored) => S::Idle,
            _ => return None,
        };

        if next == self.state {
            return None;
        }

        tracing::debug!(from = %self.state, to = %next, "session state transition");
        self.state = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut sm = StateMachine::new();
        assert_eq!(sm.apply(SessionEvent::OpenRequested), Some(SessionState::Connecting));
        assert_eq!(sm.apply(SessionEvent::Opened), Some(SessionState::Listening));
        assert_eq!(sm.apply(SessionEvent::AudioArrived), Some(SessionState::Speaking));
        assert_eq!(sm.apply(SessionEvent::Drained), Some(SessionState::Listening));
        assert_eq!(sm.apply(SessionEvent::Closed), Some(SessionState::Idle));
    }

    #[test]
    fn audio_while_speaking_is_noop() {
        let mut sm = StateMachine::new();
        sm.apply(SessionEvent::OpenRequested);
        sm.apply(SessionEvent::Opened);
        sm.apply(SessionEvent::AudioArrived);
        assert_eq!(sm.apply(SessionEvent::AudioArrived), None);
        assert_eq!(sm.state(), SessionState::Speaking);
    }

    #[test]
    fn error_from_any_state_goes_idle() {
        for setup in [
            &[][..],
            &[SessionEvent::OpenRequested][..],
            &[SessionEvent::OpenRequested, SessionEvent::Opened][..],
            &[
                SessionEvent::OpenRequested,
                SessionEvent::Opened,
                SessionEvent::AudioArrived,
            ][..],
        ] {
            let mut sm = StateMachine::new();
            for &e in setup {
                sm.apply(e);
            }
            sm.apply(SessionEvent::Errored);
            assert_eq!(sm.state(), SessionState::Idle);
        }
    }

    #[test]
    fn drain_outside_speaking_is_noop() {
        let mut sm = StateMachine::new();
        sm.apply(SessionEvent::OpenRequested);
        sm.apply(SessionEvent::Opened);
        assert_eq!(sm.apply(SessionEvent::Drained), None);
        assert_eq!(sm.state(), SessionState::Listening);
    }
}
