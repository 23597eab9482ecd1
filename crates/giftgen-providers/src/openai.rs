//! OpenAI Chat Completions client used for lyrics.
//!
//! Streams the completion and concatenates the text deltas.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, trace};

use giftgen_core::error::{GiftGenError, Result};
use giftgen_core::prompt::LYRICS_SYSTEM_PROMPT;

use crate::sse::sse_events;
use crate::{LyricsProvider, check_status};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const CONTEXT: &str = "Lyrics generation failed";

pub struct OpenAiLyrics {
    pub base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    client: reqwest::Client,
}

impl OpenAiLyrics {
    pub fn new(api_key: String, base_url: Option<&str>, model: String, temperature: f64) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model,
            temperature,
            client: reqwest::Client::new(),
        }
    }

    fn request_body(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                json!({"role": "system", "content": LYRICS_SYSTEM_PROMPT}),
                json!({"role": "user", "content": prompt}),
            ],
            temperature: self.temperature,
            stream: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<serde_json::Value>,
    temperature: f64,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Extract the text delta from one SSE `data:` payload.
/// Returns `None` for the `[DONE]` terminator.
fn delta_text(data: &str) -> Option<String> {
    let data = data.trim();
    if data == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<ChatChunk>(data) {
        Ok(chunk) => Some(
            chunk
                .choices
                .into_iter()
                .filter_map(|c| c.delta.content)
                .collect(),
        ),
        Err(e) => {
            trace!(%e, data, "Skipping unparseable completion chunk");
            Some(String::new())
        }
    }
}

#[async_trait]
impl LyricsProvider for OpenAiLyrics {
    fn id(&self) -> &str {
        "openai"
    }

    async fn write_lyrics(&self, prompt: &str) -> Result<String> {
        let body = self.request_body(prompt);
        debug!(model = %body.model, base_url = %self.base_url, "Requesting lyrics");

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| GiftGenError::vendor(CONTEXT, e))?;
        let response = check_status(response, CONTEXT).await?;

        let mut events = std::pin::pin!(sse_events(response));
        let mut lyrics = String::new();
        while let Some(event) = events.next().await {
            let event = event?;
            match delta_text(&event.data) {
                Some(text) => lyrics.push_str(&text),
                None => break,
            }
        }

        let lyrics = lyrics.trim().to_string();
        if lyrics.is_empty() {
            return Err(GiftGenError::EmptyResult(
                "Lyrics generation returned no text".into(),
            ));
        }
        info!(chars = lyrics.len(), "Generated lyrics:\n{lyrics}");
        Ok(lyrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let client = OpenAiLyrics::new("sk".into(), None, "gpt-4o-mini".into(), 0.9);
        let body = serde_json::to_value(client.request_body("a song for Maya")).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("clearly labeled"));
        assert_eq!(body["messages"][1]["content"], "a song for Maya");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = OpenAiLyrics::new("sk".into(), Some("http://localhost:1234/"), "m".into(), 0.5);
        assert_eq!(client.base_url, "http://localhost:1234");
    }

    #[test]
    fn test_delta_text() {
        let chunk = r#"{"choices":[{"delta":{"content":"[Verse 1]"}}]}"#;
        assert_eq!(delta_text(chunk).as_deref(), Some("[Verse 1]"));
        assert_eq!(delta_text(r#"{"choices":[{"delta":{}}]}"#).as_deref(), Some(""));
        assert_eq!(delta_text("not json").as_deref(), Some(""));
        assert_eq!(delta_text(" [DONE] "), None);
    }
}
