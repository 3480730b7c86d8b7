//! Live session channel
//!
//! Bidirectional WebSocket connection to the remote voice model. Outbound
//! carries encoded microphone frames; inbound carries synthesized audio and
//! transcript events. The transport guarantees in-order delivery; nothing
//! downstream reorders.

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::voice::CAPTURE_SAMPLE_RATE;
use crate::voice::PLAYBACK_SAMPLE_RATE;
use crate::voice::codec::{EncodedChunk, pcm_mime};
use crate::{Error, Result};

/// Connection parameters for a live session
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// WebSocket endpoint, e.g. `wss://live.example.com/v1/session`
    pub url: String,
    /// API key, appended as a query parameter
    pub api_key: String,
    /// Voice model identifier
    pub model: String,
    /// Prebuilt voice name
    pub voice: String,
    /// System instruction for the session
    pub system_instruction: String,
}

/// Typed events delivered by the channel to the session task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Connection established and session configured
    Opened,
    /// Output transcription text for the current model turn
    Transcript(String),
    /// A chunk of synthesized 24kHz mono PCM
    Audio(EncodedChunk),
    /// Remote closed the connection
    Closed,
    /// Transport failure; terminal for the session
    Errored(String),
}

/// Session setup sent as the first message after connect
#[derive(Debug, Serialize)]
struct SetupMessage<'a> {
    setup: SetupBody<'a>,
}

#[derive(Debug, Serialize)]
struct SetupBody<'a> {
    model: &'a str,
    voice: &'a str,
    system_instruction: &'a str,
    input_audio_format: String,
    output_audio_format: String,
}

/// Outbound realtime audio frame
#[derive(Debug, Serialize, Deserialize)]
struct RealtimeInput {
    realtime_input: MediaEnvelope,
}

#[derive(Debug, Serialize, Deserialize)]
struct MediaEnvelope {
    media: MediaBlob,
}

#[derive(Debug, Serialize, Deserialize)]
struct MediaBlob {
    data: String,
    mime_type: String,
}

/// Inbound server message; every field optional, unknown fields ignored
#[derive(Debug, Default, Deserialize)]
struct ServerMessage {
    #[serde(default)]
    server_content: Option<ServerContent>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerContent {
    #[serde(default)]
    output_transcription: Option<Transcription>,
    #[serde(default)]
    model_turn: Option<ModelTurn>,
}

#[derive(Debug, Deserialize)]
struct Transcription {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<TurnPart>,
}

#[derive(Debug, Deserialize)]
struct TurnPart {
    #[serde(default)]
    inline_data: Option<MediaBlob>,
}

enum Outbound {
    Audio(EncodedChunk),
    Close,
}

/// Handle to an open live session
///
/// Dropping the handle closes the connection once the pump task drains.
pub struct LiveChannel {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl LiveChannel {
    /// Connect, send the session setup and spawn the socket pump
    ///
    /// Returns the handle plus the receiver for [`ChannelEvent`]s. `Opened`
    /// is the first event delivered.
    ///
    /// # Errors
    ///
    /// Returns error if the WebSocket handshake or setup send fails
    pub async fn connect(
        config: &LiveConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ChannelEvent>)> {
        let url = format!("{}?key={}", config.url, config.api_key);
        let (ws, _response) = connect_async(url).await?;
        tracing::debug!(url = %config.url, model = %config.model, "live channel connected");

        let (mut sink, mut stream) = ws.split();

        let setup = SetupMessage {
            setup: SetupBody {
                model: &config.model,
                voice: &config.voice,
                system_instruction: &config.system_instruction,
                input_audio_format: pcm_mime(CAPTURE_SAMPLE_RATE),
                output_audio_format: pcm_mime(PLAYBACK_SAMPLE_RATE),
            },
        };
        sink.send(Message::Text(serde_json::to_string(&setup)?.into()))
            .await?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();

        let _ = event_tx.send(ChannelEvent::Opened);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    out = outbound_rx.recv() => match out {
                        Some(Outbound::Audio(chunk)) => {
                            let msg = RealtimeInput {
                                realtime_input: MediaEnvelope {
                                    media: MediaBlob {
                                        data: chunk.data,
                                        mime_type: chunk.mime_type,
                                    },
                                },
                            };
                            let Ok(text) = serde_json::to_string(&msg) else {
                                continue;
                            };
                            if let Err(e) = sink.send(Message::Text(text.into())).await {
                                let _ = event_tx.send(ChannelEvent::Errored(e.to_string()));
                                break;
                            }
                        }
                        Some(Outbound::Close) | None => {
                            let _ = sink.send(Message::Close(None)).await;
                            let _ = event_tx.send(ChannelEvent::Closed);
                            break;
                        }
                    },
                    inbound = stream.next() => match inbound {
                        Some(Ok(Message::Text(text))) => {
                            for event in parse_server_message(&text) {
                                let _ = event_tx.send(event);
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            let _ = event_tx.send(ChannelEvent::Closed);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            let _ = event_tx.send(ChannelEvent::Errored(e.to_string()));
                            break;
                        }
                    },
                }
            }
            tracing::debug!("live channel pump finished");
        });

        Ok((
            Self {
                outbound: outbound_tx,
            },
            event_rx,
        ))
    }

    /// Send one encoded microphone frame; fire-and-forget
    ///
    /// # Errors
    ///
    /// Returns [`Error::Channel`] if the pump task has already exited
    pub fn send_audio(&self, chunk: EncodedChunk) -> Result<()> {
        self.outbound
            .send(Outbound::Audio(chunk))
            .map_err(|_| Error::Channel("session channel closed".to_string()))
    }

    /// Request a clean close; idempotent
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Translate one server message into channel events
///
/// Unparseable messages are dropped with a warning; a malformed frame must
/// not end the session.
fn parse_server_message(text: &str) -> Vec<ChannelEvent> {
    let msg: ServerMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!(error = %e, "dropping unparseable server message");
            return Vec::new();
        }
    };

    let mut events = Vec::new();
    if let Some(content) = msg.server_content {
        if let Some(transcription) = content.output_transcription {
            events.push(ChannelEvent::Transcript(transcription.text));
        }
        if let Some(turn) = content.model_turn {
            for part in turn.parts {
                if let Some(blob) = part.inline_data {
                    events.push(ChannelEvent::Audio(EncodedChunk {
                        data: blob.data,
                        mime_type: blob.mime_type,
                    }));
                }
            }
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_audio_wire_shape() {
        let msg = RealtimeInput {
            realtime_input: MediaEnvelope {
                media: MediaBlob {
                    data: "AAAA".to_string(),
                    mime_type: pcm_mime(CAPTURE_SAMPLE_RATE),
                },
            },
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        assert_eq!(json["realtime_input"]["media"]["data"], "AAAA");
        assert_eq!(
            json["realtime_input"]["media"]["mime_type"],
            "audio/pcm;rate=16000"
        );
    }

    #[test]
    fn parses_transcript_and_audio() {
        let text = r#"{
            "server_content": {
                "output_transcription": { "text": "hola" },
                "model_turn": { "parts": [
                    { "inline_data": { "data": "UElORw==", "mime_type": "audio/pcm;rate=24000" } }
                ]}
            }
        }"#;
        let events = parse_server_message(text);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ChannelEvent::Transcript("hola".to_string()));
        assert!(matches!(&events[1], ChannelEvent::Audio(c) if c.data == "UElORw=="));
    }

    #[test]
    fn audio_only_message() {
        let text = r#"{"server_content":{"model_turn":{"parts":[
            {"inline_data":{"data":"AA==","mime_type":"audio/pcm;rate=24000"}},
            {"inline_data":{"data":"BB==","mime_type":"audio/pcm;rate=24000"}}
        ]}}}"#;
        let events = parse_server_message(text);
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, ChannelEvent::Audio(_))));
    }

    #[test]
    fn garbage_message_yields_no_events() {
        assert!(parse_server_message("not json").is_empty());
        assert!(parse_server_message("{}").is_empty());
        assert!(parse_server_message(r#"{"server_content":{}}"#).is_empty());
    }
}
