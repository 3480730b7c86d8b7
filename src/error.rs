//! Error types for the SARA voice client

use thiserror::Error;

/// Result type alias for SARA operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the SARA voice client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Microphone access was denied by the platform
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    /// No usable audio device is available
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Generic audio error (stream build, playback)
    #[error("audio error: {0}")]
    Audio(String),

    /// Malformed inbound audio chunk
    #[error("decode error: {0}")]
    Decode(String),

    /// Live session transport failure
    #[error("channel error: {0}")]
    Channel(String),

    /// Chat completion error
    #[error("chat error: {0}")]
    Chat(String),

    /// Media generation error
    #[error("media error: {0}")]
    Media(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// WebSocket error
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
