//! Image + audio → queued vendor job → downloaded video artifact.
//!
//! The polling loop waits with `tokio::time::sleep` raced against the job's
//! cancellation token, so a pending job holds no worker thread and stops
//! promptly on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use giftgen_core::error::{GiftGenError, Result};
use giftgen_core::types::{GenerateVideoRequest, GenerateVideoResponse, Resolution};
use giftgen_media::{ArtifactStore, AudioClipper, download_to_store};
use giftgen_providers::{
    JobTicket, MediaUploader, VendorStatus, VideoJobSpec, VideoProvider, extract_video_url,
};

use crate::job::{GenerationJob, JobState};

/// Polling cadence and ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub poll: PollPolicy,
    /// Local audio is clipped to this length before upload.
    pub audio_clip: Duration,
    pub prompt: String,
    pub default_resolution: Resolution,
    /// Public origin of this server, for recognising absolute local URLs.
    pub public_base_url: Option<String>,
}

#[derive(Clone)]
pub struct VideoPipeline {
    video: Option<Arc<dyn VideoProvider>>,
    uploader: Option<Arc<dyn MediaUploader>>,
    clipper: Arc<dyn AudioClipper>,
    music_store: ArtifactStore,
    video_store: ArtifactStore,
    http: reqwest::Client,
    settings: VideoSettings,
}

fn not_configured() -> GiftGenError {
    GiftGenError::NotConfigured(
        "Video generation is not available. FAL_KEY is not configured.".into(),
    )
}

impl VideoPipeline {
    pub fn new(
        video: Option<Arc<dyn VideoProvider>>,
        uploader: Option<Arc<dyn MediaUploader>>,
        clipper: Arc<dyn AudioClipper>,
        music_store: ArtifactStore,
        video_store: ArtifactStore,
        settings: VideoSettings,
    ) -> Self {
        Self {
            video,
            uploader,
            clipper,
            music_store,
            video_store,
            http: reqwest::Client::new(),
            settings,
        }
    }

    pub fn video_store(&self) -> &ArtifactStore {
        &self.video_store
    }

    /// Upload caller-supplied bytes to vendor storage.
    pub async fn upload(&self, bytes: Vec<u8>, file_name: &str, content_type: &str) -> Result<String> {
        let uploader = self.uploader.as_ref().ok_or_else(not_configured)?;
        uploader.upload(bytes, file_name, content_type).await
    }

    /// Run one video generation to completion.
    pub async fn generate(
        &self,
        request: &GenerateVideoRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerateVideoResponse> {
        let video = self.video.as_ref().ok_or_else(not_configured)?;
        if request.audio_url.trim().is_empty() || request.image_url.trim().is_empty() {
            return Err(GiftGenError::InvalidRequest(
                "audio_url and image_url are required".into(),
            ));
        }

        let audio_url = self.prepare_audio(&request.audio_url).await?;
        let spec = VideoJobSpec {
            image_url: request.image_url.clone(),
            audio_url,
            prompt: self.settings.prompt.clone(),
            resolution: request.resolution.unwrap_or(self.settings.default_resolution),
        };

        let ticket = video.submit(&spec).await?;
        let descriptor = poll_until_complete(video.as_ref(), &ticket, self.settings.poll, cancel).await?;

        let remote = extract_video_url(&descriptor).ok_or_else(|| {
            error!(request_id = %ticket.request_id, %descriptor, "Result carries no video URL");
            GiftGenError::EmptyResult("No video URL was returned by the generator.".into())
        })?;

        let artifact = download_to_store(&self.http, &remote, &self.video_store).await?;
        info!(
            request_id = %ticket.request_id,
            filename = %artifact.filename,
            size = artifact.size_bytes,
            "Video generated"
        );

        Ok(GenerateVideoResponse {
            success: true,
            message: "Video generated successfully!".into(),
            filename: Some(artifact.filename),
            file_url: Some(artifact.url),
            video_url: Some(remote),
        })
    }

    /// Replace a locally hosted audio reference with an uploaded clip.
    ///
    /// External URLs pass through untouched. The clip's temp file is removed
    /// when this returns, on success and on error alike.
    pub async fn prepare_audio(&self, audio_url: &str) -> Result<String> {
        let Some(name) = self.local_audio_name(audio_url) else {
            return Ok(audio_url.to_string());
        };
        let uploader = self.uploader.as_ref().ok_or_else(not_configured)?;

        let source = self.music_store.resolve(&name).await.map_err(|e| match e {
            GiftGenError::NotFound(_) => {
                GiftGenError::NotFound(format!("Audio file not found: {name}"))
            }
            other => other,
        })?;

        let clip = self.clipper.clip(&source, self.settings.audio_clip).await?;
        let bytes = tokio::fs::read(clip.path()).await?;
        debug!(%name, clip_bytes = bytes.len(), "Uploading audio clip");

        let url = uploader
            .upload(bytes, &format!("clip_{name}"), "audio/mpeg")
            .await?;
        info!(%name, %url, "Local audio clipped and uploaded");
        Ok(url)
    }

    fn local_audio_name(&self, audio_url: &str) -> Option<String> {
        let base = self.settings.public_base_url.as_deref();
        self.music_store
            .local_name(audio_url, base)
            .or_else(|| loopback_path(audio_url).and_then(|p| self.music_store.local_name(p, None)))
    }
}

/// Path part of an `http(s)://localhost...` or `http(s)://127.0.0.1...` URL.
fn loopback_path(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))?;
    let (authority, path) = rest.split_at(rest.find('/')?);
    let host = authority.rsplit_once(':').map_or(authority, |(h, _)| h);
    matches!(host, "localhost" | "127.0.0.1" | "[::1]").then_some(path)
}

/// Poll `ticket` until the vendor reports a terminal status, then fetch the result.
///
/// Each round checks the deadline, reads the status once, and sleeps one
/// interval if the job is still pending. A status read that outlives the
/// remaining budget ends the job as timed out. The result is fetched exactly
/// once, and only after completion.
pub async fn poll_until_complete(
    video: &dyn VideoProvider,
    ticket: &JobTicket,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> Result<serde_json::Value> {
    let mut job = GenerationJob::submitted(&ticket.request_id);

    loop {
        let elapsed = job.elapsed();
        if elapsed > policy.timeout {
            return Err(timed_out(&mut job));
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                job.cancel();
                return Err(GiftGenError::Cancelled);
            }
            status = video.status(ticket) => status,
            _ = tokio::time::sleep(policy.timeout.saturating_sub(elapsed)) => {
                return Err(timed_out(&mut job));
            }
        };
        let status = match status {
            Ok(status) => status,
            Err(e) => {
                job.fail();
                error!(request_id = %job.request_id, %e, "Video status check failed");
                return Err(e);
            }
        };

        match job.observe(&status) {
            JobState::Completed => break,
            JobState::Failed => {
                let reason = match status {
                    VendorStatus::Failed { reason } => reason,
                    other => format!("{other:?}"),
                };
                error!(request_id = %job.request_id, %reason, "Video job failed");
                return Err(GiftGenError::JobFailed(reason));
            }
            state => {
                if let VendorStatus::InQueue { position } = status {
                    debug!(request_id = %job.request_id, ?position, "Video job queued");
                } else {
                    debug!(request_id = %job.request_id, ?state, "Video job pending");
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                job.cancel();
                info!(request_id = %job.request_id, "Video job polling cancelled");
                return Err(GiftGenError::Cancelled);
            }
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }

    info!(
        request_id = %job.request_id,
        submitted_at = %job.submitted_at,
        polls = job.polls(),
        elapsed_secs = job.elapsed().as_secs(),
        "Video job completed"
    );
    video.result(ticket).await
}

fn timed_out(job: &mut GenerationJob) -> GiftGenError {
    job.time_out();
    let elapsed_secs = job.elapsed().as_secs();
    warn!(
        request_id = %job.request_id,
        submitted_at = %job.submitted_at,
        elapsed_secs,
        polls = job.polls(),
        "Video job timed out"
    );
    GiftGenError::Timeout { elapsed_secs }
}
