//! Image and video generation client
//!
//! Image generation is a single request returning inline data. Video
//! generation starts a long-running operation and polls it to completion;
//! this is the only place in the client that poll-waits.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;

use crate::config::Config;
use crate::{Error, Result};

/// Response from the image generation API
#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    candidates: Vec<ImageCandidate>,
}

#[derive(Deserialize)]
struct ImageCandidate {
    content: ImageContent,
}

#[derive(Deserialize)]
struct ImageContent {
    #[serde(default)]
    parts: Vec<ImagePart>,
}

#[derive(Deserialize)]
struct ImagePart {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
struct InlineData {
    data: String,
}

/// A started long-running video operation
#[derive(Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    response: Option<OperationResponse>,
}

#[derive(Deserialize)]
struct OperationResponse {
    #[serde(default)]
    generated_videos: Vec<GeneratedVideo>,
}

#[derive(Deserialize)]
struct GeneratedVideo {
    video: VideoRef,
}

#[derive(Deserialize)]
struct VideoRef {
    uri: String,
}

/// Generates images and videos from prompts
pub struct MediaClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    image_model: String,
    video_model: String,
    poll_interval: Duration,
}

impl MediaClient {
    /// Create a media client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            api_key: config.require_api_key()?.to_string(),
            image_model: config.media.image_model.clone(),
            video_model: config.media.video_model.clone(),
            poll_interval: Duration::from_secs(config.media.poll_interval_secs),
        })
    }

    /// Generate one image, returning the decoded image bytes
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or no image part comes back
    pub async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        tracing::debug!(model = %self.image_model, "starting image generation");

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, self.image_model, self.api_key
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "image_config": { "aspect_ratio": "1:1", "image_size": "4K" },
        });

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "image API error");
            return Err(Error::Media(format!("image API error {status}: {body}")));
        }

        let result: ImageResponse = response.json().await?;
        let data = result
            .candidates
            .first()
            .and_then(|c| c.content.parts.iter().find_map(|p| p.inline_data.as_ref()))
            .map(|inline| inline.data.clone())
            .ok_or_else(|| Error::Media("no image in response".to_string()))?;

        let bytes = BASE64
            .decode(&data)
            .map_err(|e| Error::Media(format!("invalid image payload: {e}")))?;

        tracing::info!(bytes = bytes.len(), "image generated");
        Ok(bytes)
    }

    /// Generate a video, polling the operation until done
    ///
    /// Returns the download URI of the first generated video.
    ///
    /// # Errors
    ///
    /// Returns error if the operation fails or finishes with no video
    pub async fn generate_video(&self, prompt: &str) -> Result<String> {
        tracing::debug!(model = %self.video_model, "starting video generation");

        let url = format!(
            "{}/models/{}:generateVideos?key={}",
            self.api_base, self.video_model, self.api_key
        );
        let body = serde_json::json!({
            "prompt": prompt,
            "config": { "number_of_videos": 1, "resolution": "1080p", "aspect_ratio": "16:9" },
        });

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "video API error");
            return Err(Error::Media(format!("video API error {status}: {body}")));
        }

        let mut operation: Operation = response.json().await?;

        while !operation.done {
            tokio::time::sleep(self.poll_interval).await;
            tracing::debug!(operation = %operation.name, "polling video operation");

            let poll_url = format!("{}/{}?key={}", self.api_base, operation.name, self.api_key);
            operation = self
                .client
                .get(&poll_url)
                .send()
                .await?
                .error_for_status()
                .map_err(|e| Error::Media(format!("video poll failed: {e}")))?
                .json()
                .await?;
        }

        let uri = operation
            .response
            .and_then(|r| r.generated_videos.into_iter().next())
            .map(|v| v.video.uri)
            .ok_or_else(|| Error::Media("operation finished with no video".to_string()))?;

        tracing::info!(uri = %uri, "video generated");
        Ok(uri)
    }
}
