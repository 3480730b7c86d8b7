//! Configuration for the SARA voice client
//!
//! Settings come from an optional TOML file under the platform config
//! directory, with environment variables taking precedence for secrets
//! and endpoints.

use std::path::PathBuf;

use serde::Deserialize;

use crate::persona::Persona;
use crate::{Error, Result};

/// Client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for the generative service (`SARA_API_KEY`)
    pub api_key: Option<String>,

    /// Live session WebSocket endpoint (`SARA_LIVE_URL`)
    pub live_url: String,

    /// HTTP API base for chat and media generation (`SARA_API_BASE`)
    pub api_base: String,

    /// Active persona
    pub persona: Persona,

    /// Voice session settings
    pub voice: VoiceConfig,

    /// Chat settings
    pub chat: ChatConfig,

    /// Media generation settings
    pub media: MediaConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            live_url: "wss://generativelanguage.googleapis.com/v1/live".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1".to_string(),
            persona: Persona::default(),
            voice: VoiceConfig::default(),
            chat: ChatConfig::default(),
            media: MediaConfig::default(),
        }
    }
}

/// Voice session settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Live voice model identifier
    pub model: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash-native-audio-preview-12-2025".to_string(),
        }
    }
}

/// Chat settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Chat model identifier
    pub model: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gemini-3-pro-preview".to_string(),
        }
    }
}

/// Media generation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Image generation model
    pub image_model: String,

    /// Video generation model
    pub video_model: String,

    /// Seconds between video operation polls
    pub poll_interval_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            image_model: "gemini-3-pro-image-preview".to_string(),
            video_model: "veo-3.1-generate-preview".to_string(),
            poll_interval_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from the config file and environment
    ///
    /// # Errors
    ///
    /// Returns error if the config file exists but cannot be read or parsed
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(&path)?;
                tracing::debug!(path = %path.display(), "loaded config file");
                toml::from_str(&text)?
            }
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Path to the config file, if a config directory can be resolved
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "nuworld", "sara")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply environment overrides on top of file values
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("SARA_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("SARA_LIVE_URL") {
            if !url.is_empty() {
                self.live_url = url;
            }
        }
        if let Ok(base) = std::env::var("SARA_API_BASE") {
            if !base.is_empty() {
                self.api_base = base;
            }
        }
    }

    /// API key, or a config error naming the env var
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no key is configured
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| Error::Config("SARA_API_KEY not set".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = Config::default();
        assert!(config.live_url.starts_with("wss://"));
        assert_eq!(config.media.poll_interval_secs, 10);
        assert_eq!(config.persona.name, "SARA");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            api_key = "k"

            [persona]
            name = "Nova"

            [media]
            poll_interval_secs = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.persona.name, "Nova");
        assert_eq!(config.media.poll_interval_secs, 2);
        // Untouched sections keep defaults
        assert_eq!(config.voice.model, VoiceConfig::default().model);
    }

    #[test]
    fn require_api_key_errors_when_missing() {
        let config = Config {
            api_key: None,
            ..Config::default()
        };
        assert!(matches!(config.require_api_key(), Err(Error::Config(_))));
    }
}
