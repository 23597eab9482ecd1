//! Job orchestration.
//!
//! Each generation request is sequenced here: vendor calls, duration
//! clamping, polling, and persistence through the artifact stores.

use std::sync::Arc;

use tracing::warn;

use giftgen_core::config::Config;
use giftgen_core::types::Resolution;
use giftgen_media::{ArtifactStore, FfmpegClipper};
use giftgen_providers::VendorSet;

pub mod job;
pub mod music;
pub mod video;

pub use job::{GenerationJob, JobState};
pub use music::{MusicMode, MusicPipeline};
pub use video::{PollPolicy, VideoPipeline, VideoSettings, poll_until_complete};

/// Both pipelines, wired to the same stores.
#[derive(Clone)]
pub struct Orchestrator {
    pub music: MusicPipeline,
    pub video: VideoPipeline,
}

impl Orchestrator {
    pub fn new(config: &Config, vendors: &VendorSet) -> Self {
        let music_store = ArtifactStore::music(config.music_dir());
        let video_store = ArtifactStore::video(config.video_dir());

        let mode = if config.lyrics_stage() {
            MusicMode::TwoStage
        } else {
            MusicMode::SingleStage
        };

        let default_resolution = match config.default_resolution() {
            Some(raw) => Resolution::parse(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "Unknown video.default_resolution, using 480p");
                Resolution::default()
            }),
            None => Resolution::default(),
        };

        let settings = VideoSettings {
            poll: PollPolicy {
                interval: config.video_poll_interval(),
                timeout: config.video_timeout(),
            },
            audio_clip: config.audio_clip(),
            prompt: config.video_prompt(),
            default_resolution,
            public_base_url: config.public_base_url(),
        };

        Self {
            music: MusicPipeline::new(
                vendors.lyrics.clone(),
                vendors.music.clone(),
                music_store.clone(),
                mode,
            ),
            video: VideoPipeline::new(
                vendors.video.clone(),
                vendors.uploader.clone(),
                Arc::new(FfmpegClipper::new(config.ffmpeg_path())),
                music_store,
                video_store,
                settings,
            ),
        }
    }
}
