//! Chat completion and vision client
//!
//! Text turns and single-frame image analysis go through the same
//! `generateContent` endpoint; only the request parts differ.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;

use crate::config::Config;
use crate::{Error, Result};

/// Default prompt for image analysis when the caller gives none
const VISION_PROMPT: &str = "Use your magic eyes. What do you see in my world? \
    Explain it with your sophisticated SARA personality.";

/// A single chat turn
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// "user" or "model"
    pub role: String,
    /// Message text
    pub content: String,
}

/// Response from the chat completion API
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Request body for a text conversation: prior turns plus the new message
fn chat_request_body(
    system_instruction: &str,
    history: &[ChatMessage],
    message: &str,
) -> serde_json::Value {
    let mut contents: Vec<serde_json::Value> = history
        .iter()
        .map(|turn| {
            serde_json::json!({
                "role": turn.role,
                "parts": [{ "text": turn.content }],
            })
        })
        .collect();
    contents.push(serde_json::json!({
        "role": "user",
        "parts": [{ "text": message }],
    }));

    serde_json::json!({
        "system_instruction": { "parts": [{ "text": system_instruction }] },
        "contents": contents,
    })
}

/// Request body for image analysis: inline image bytes then the prompt
fn vision_request_body(
    system_instruction: &str,
    image_b64: &str,
    image_mime: &str,
    prompt: &str,
) -> serde_json::Value {
    serde_json::json!({
        "system_instruction": { "parts": [{ "text": system_instruction }] },
        "contents": [{
            "role": "user",
            "parts": [
                { "inline_data": { "data": image_b64, "mime_type": image_mime } },
                { "text": prompt },
            ],
        }],
    })
}

/// Sends persona-driven chat turns and image analysis requests to the
/// completion API
pub struct ChatClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    system_instruction: String,
}

impl ChatClient {
    /// Create a chat client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            api_key: config.require_api_key()?.to_string(),
            model: config.chat.model.clone(),
            system_instruction: config.persona.system_instruction.clone(),
        })
    }

    /// Send one message with prior history, returning the reply text
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response carries no text
    pub async fn send(&self, history: &[ChatMessage], message: &str) -> Result<String> {
        tracing::debug!(model = %self.model, turns = history.len(), "sending chat request");
        let body = chat_request_body(&self.system_instruction, history, message);
        let reply = self.generate(&body).await?;
        tracing::info!(chars = reply.len(), "chat reply received");
        Ok(reply)
    }

    /// Describe a single image frame, returning the analysis text
    ///
    /// `image_mime` tags the raw bytes (e.g. `image/jpeg`); with no
    /// `prompt` the persona's default "what do you see" question is used.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response carries no text
    pub async fn describe_image(
        &self,
        image: &[u8],
        image_mime: &str,
        prompt: Option<&str>,
    ) -> Result<String> {
        tracing::debug!(model = %self.model, bytes = image.len(), "sending vision request");
        let body = vision_request_body(
            &self.system_instruction,
            &BASE64.encode(image),
            image_mime,
            prompt.unwrap_or(VISION_PROMPT),
        );
        let analysis = self.generate(&body).await?;
        tracing::info!(chars = analysis.len(), "image analysis received");
        Ok(analysis)
    }

    /// Post one `generateContent` request and extract the first text part
    async fn generate(&self, body: &serde_json::Value) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, self.model, self.api_key
        );

        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat API error");
            return Err(Error::Chat(format!("chat API error {status}: {body}")));
        }

        let result: ChatResponse = response.json().await?;
        result
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Chat("empty chat response".to_string()))
    }
}
