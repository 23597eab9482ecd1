//! `generate_music`: single-stage music generation for the voice agent.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{error, info};

use giftgen_core::error::GiftGenError;
use giftgen_core::types::DEFAULT_DURATION_SECS;
use giftgen_jobs::{MusicMode, Orchestrator};

use crate::{Tool, ToolContext, ToolOutput};

pub struct GenerateMusicTool {
    orchestrator: Arc<Orchestrator>,
}

impl GenerateMusicTool {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

/// Turn a pipeline failure into something the agent can say.
fn spoken_failure(err: &GiftGenError) -> String {
    match err {
        GiftGenError::NotConfigured(_) => "Sorry, music generation is not available. The ELEVENLABS_API_KEY environment variable is not set.".into(),
        GiftGenError::EmptyResult(_) => {
            "Sorry, I couldn't generate any music. Please try a different prompt.".into()
        }
        other => format!("Sorry, I encountered an error while generating music: {other}"),
    }
}

#[async_trait]
impl Tool for GenerateMusicTool {
    fn name(&self) -> &str {
        "generate_music"
    }

    fn description(&self) -> &str {
        "Generate music based on a text prompt and save it locally. Use this tool when the user asks you to create, generate, or make music for them. The prompt should describe the style, mood, instruments, and any other characteristics they want."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "A detailed description of the music to generate (e.g., \"upbeat electronic dance music with synthesizers\", \"calm piano melody for relaxation\")"
                },
                "duration_seconds": {
                    "type": "integer",
                    "description": "Length of the music in seconds (default: 30, max: 120)",
                    "default": DEFAULT_DURATION_SECS
                }
            },
            "required": ["prompt"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolOutput> {
        let Some(prompt) = params
            .get("prompt")
            .and_then(|v| v.as_str())
            .filter(|p| !p.trim().is_empty())
        else {
            return Ok(ToolOutput::error(
                "Sorry, I need a description of the music you want.",
            ));
        };
        let duration = params
            .get("duration_seconds")
            .and_then(|v| v.as_i64())
            .unwrap_or(DEFAULT_DURATION_SECS);

        info!(session = %context.session_key, prompt, duration, "Generating music");

        let pipeline = &self.orchestrator.music;
        match pipeline.run(prompt, duration, MusicMode::SingleStage).await {
            Ok(response) => {
                let filename = response.filename.unwrap_or_default();
                let path = pipeline.store().dir().join(&filename);
                info!(session = %context.session_key, path = %path.display(), "Music saved");
                let secs = giftgen_core::types::clamp_duration(duration);
                Ok(ToolOutput::ok(format!(
                    "I've created your music and saved it to {}. The track is {secs} seconds long. Enjoy!",
                    path.display()
                )))
            }
            Err(e) => {
                error!(session = %context.session_key, %e, "Music generation failed");
                Ok(ToolOutput::error(spoken_failure(&e)))
            }
        }
    }
}
