//! Persona definition
//!
//! The system instruction text itself is owner-supplied through the config
//! file; this module only carries the type and the voice-mode suffix.

use serde::Deserialize;

/// Suffix appended to the system instruction for live voice sessions
const VOICE_GUIDE: &str = "\n\nVOICE GUIDE: Speak like a warm friend. Use simple words. \
     If you detect a child, be extra patient and playful.";

/// A persona the assistant speaks and chats as
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Persona {
    /// Display name
    pub name: String,
    /// Base system instruction for chat and voice
    pub system_instruction: String,
    /// Prebuilt voice name for the live session
    pub voice: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: "SARA".to_string(),
            system_instruction:
                "You are SARA, a helpful realtime assistant. Answer in the user's language."
                    .to_string(),
            voice: "Kore".to_string(),
        }
    }
}

impl Persona {
    /// Instruction for live voice sessions: base text plus the voice guide
    #[must_use]
    pub fn live_instruction(&self) -> String {
        format!("{}{VOICE_GUIDE}", self.system_instruction)
    }
}
