//! ElevenLabs music API client.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tracing::debug;

use giftgen_core::error::{GiftGenError, Result};

use crate::{AudioStream, MusicProvider, check_status};

const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";
const CONTEXT: &str = "Music generation failed";

pub struct ElevenLabsMusic {
    pub base_url: String,
    api_key: String,
    model: String,
    output_format: String,
    client: reqwest::Client,
}

impl ElevenLabsMusic {
    pub fn new(api_key: String, base_url: Option<&str>, model: String, output_format: String) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(ELEVENLABS_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model,
            output_format,
            client: reqwest::Client::new(),
        }
    }

    /// Streaming endpoint URL, output format in the query string.
    pub fn stream_url(&self) -> String {
        format!(
            "{}/v1/music/stream?output_format={}",
            self.base_url, self.output_format
        )
    }

    fn request_body(&self, prompt: &str, length: Duration) -> serde_json::Value {
        json!({
            "prompt": prompt,
            "music_length_ms": length.as_millis() as u64,
            "model_id": self.model,
        })
    }
}

#[async_trait]
impl MusicProvider for ElevenLabsMusic {
    fn id(&self) -> &str {
        "elevenlabs"
    }

    async fn compose(&self, prompt: &str, length: Duration) -> Result<AudioStream> {
        debug!(
            model = %self.model,
            length_ms = length.as_millis() as u64,
            prompt_len = prompt.len(),
            "Starting music stream"
        );

        let response = self
            .client
            .post(self.stream_url())
            .header("xi-api-key", &self.api_key)
            .json(&self.request_body(prompt, length))
            .send()
            .await
            .map_err(|e| GiftGenError::vendor(CONTEXT, e))?;
        let response = check_status(response, CONTEXT).await?;

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| GiftGenError::vendor("Music stream error", e)));
        Ok(Box::pin(stream))
    }
}
