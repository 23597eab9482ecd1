//! Vendor clients.
//!
//! Each external capability sits behind a trait so the job pipelines can be
//! driven by scripted fakes in tests:
//! - [`LyricsProvider`]: prompt → song lyrics (OpenAI chat completions)
//! - [`MusicProvider`]: prompt → streamed audio (ElevenLabs music)
//! - [`VideoProvider`]: image + audio → queued job, polled to completion (fal)
//! - [`MediaUploader`]: bytes → publicly reachable URL (fal storage)

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tracing::debug;

use giftgen_core::config::Config;
use giftgen_core::error::{GiftGenError, Result};
use giftgen_core::types::Resolution;

pub mod elevenlabs;
pub mod fal;
pub mod openai;
pub mod sse;

/// Audio bytes as they arrive from the vendor, in order.
pub type AudioStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Provider identifier (e.g., "openai").
    fn id(&self) -> &str;

    async fn write_lyrics(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait MusicProvider: Send + Sync {
    fn id(&self) -> &str;

    /// Start composing a track of the given length and stream the encoded audio.
    async fn compose(&self, prompt: &str, length: Duration) -> Result<AudioStream>;
}

/// Input of a video job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoJobSpec {
    pub image_url: String,
    pub audio_url: String,
    pub prompt: String,
    pub resolution: Resolution,
}

/// Vendor-side identity of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTicket {
    pub request_id: String,
    pub status_url: String,
    pub response_url: String,
}

/// Status reported by the vendor while a job is queued or running.
///
/// Closed set: anything else is rejected by [`VendorStatus::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorStatus {
    InQueue { position: Option<u64> },
    InProgress,
    Completed,
    Failed { reason: String },
}

impl VendorStatus {
    /// Parse the vendor's status word. Unknown words fail loudly.
    pub fn parse(status: &str, position: Option<u64>, error: Option<&str>) -> Result<Self> {
        match status {
            "IN_QUEUE" => Ok(Self::InQueue { position }),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" => match error {
                Some(reason) if !reason.is_empty() => Ok(Self::Failed {
                    reason: reason.to_string(),
                }),
                _ => Ok(Self::Completed),
            },
            "FAILED" | "ERROR" => Ok(Self::Failed {
                reason: error.unwrap_or("vendor reported failure").to_string(),
            }),
            other => Err(GiftGenError::UnrecognizedStatus(other.to_string())),
        }
    }
}

#[async_trait]
pub trait VideoProvider: Send + Sync {
    fn id(&self) -> &str;

    async fn submit(&self, spec: &VideoJobSpec) -> Result<JobTicket>;

    async fn status(&self, ticket: &JobTicket) -> Result<VendorStatus>;

    /// Fetch the result descriptor of a completed job.
    async fn result(&self, ticket: &JobTicket) -> Result<serde_json::Value>;
}

#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Upload bytes to vendor storage, returning the public URL.
    async fn upload(&self, bytes: Vec<u8>, file_name: &str, content_type: &str) -> Result<String>;
}

/// Pull the video URL out of a result descriptor (`{"video": {"url": ...}}`).
pub fn extract_video_url(descriptor: &serde_json::Value) -> Option<String> {
    descriptor
        .get("video")
        .and_then(|v| v.get("url"))
        .or_else(|| descriptor.get("video_url"))
        .and_then(|u| u.as_str())
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}

/// The set of vendors that have credentials configured.
#[derive(Clone, Default)]
pub struct VendorSet {
    pub lyrics: Option<Arc<dyn LyricsProvider>>,
    pub music: Option<Arc<dyn MusicProvider>>,
    pub video: Option<Arc<dyn VideoProvider>>,
    pub uploader: Option<Arc<dyn MediaUploader>>,
}

impl VendorSet {
    /// Build clients for every vendor whose API key resolves.
    pub fn from_config(config: &Config) -> Self {
        let mut set = Self::default();

        if let Some(key) = config.lyrics_api_key() {
            let base_url = config.lyrics.as_ref().and_then(|l| l.base_url.as_deref());
            set.lyrics = Some(Arc::new(openai::OpenAiLyrics::new(
                key,
                base_url,
                config.lyrics_model(),
                config.lyrics_temperature(),
            )));
        }

        if let Some(key) = config.music_api_key() {
            let base_url = config.music.as_ref().and_then(|m| m.base_url.as_deref());
            set.music = Some(Arc::new(elevenlabs::ElevenLabsMusic::new(
                key,
                base_url,
                config.music_model(),
                config.music_output_format(),
            )));
        }

        if let Some(key) = config.video_api_key() {
            let video = config.video.clone().unwrap_or_default();
            let fal = Arc::new(fal::FalClient::new(
                key,
                video.queue_base_url.as_deref(),
                video.storage_base_url.as_deref(),
                config.video_model(),
            ));
            set.video = Some(fal.clone());
            set.uploader = Some(fal);
        }

        debug!(
            lyrics = set.lyrics.is_some(),
            music = set.music.is_some(),
            video = set.video.is_some(),
            "Vendor clients initialised"
        );
        set
    }
}

/// Turn a non-2xx response into a vendor error carrying the body text.
pub(crate) async fn check_status(
    response: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(GiftGenError::vendor(context, format!("{status}: {body}")))
}
