//! Audio clipping.
//!
//! Clips are written to [`NamedTempFile`]s, which are removed when the handle
//! drops, whichever way the caller exits.

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, error};

use giftgen_core::error::{GiftGenError, Result};

#[async_trait]
pub trait AudioClipper: Send + Sync {
    /// Copy at most the first `max` of `source` into a scoped temporary file.
    async fn clip(&self, source: &Path, max: Duration) -> Result<NamedTempFile>;
}

/// Clips with an external `ffmpeg` binary, re-encoding to MP3.
#[derive(Debug, Clone)]
pub struct FfmpegClipper {
    program: String,
}

impl FfmpegClipper {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command-line arguments for clipping `source` into `dest`.
    pub fn args(source: &Path, dest: &Path, max: Duration) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-y", "-hide_banner", "-loglevel", "error", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(source.as_os_str().to_owned());
        args.push("-t".into());
        args.push(format!("{:.3}", max.as_secs_f64()).into());
        for arg in ["-vn", "-codec:a", "libmp3lame", "-b:a", "128k"] {
            args.push(arg.into());
        }
        args.push(dest.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl AudioClipper for FfmpegClipper {
    async fn clip(&self, source: &Path, max: Duration) -> Result<NamedTempFile> {
        let clip = tempfile::Builder::new()
            .prefix("giftgen_clip_")
            .suffix(".mp3")
            .tempfile()
            .map_err(|e| GiftGenError::Media(format!("failed to create temp clip: {e}")))?;

        debug!(
            source = %source.display(),
            dest = %clip.path().display(),
            max_secs = max.as_secs_f64(),
            "Clipping audio"
        );

        let output = tokio::process::Command::new(&self.program)
            .args(Self::args(source, clip.path(), max))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| GiftGenError::Media(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(status = %output.status, %stderr, "ffmpeg failed");
            return Err(GiftGenError::Media(format!("ffmpeg failed: {}", stderr.trim())));
        }

        Ok(clip)
    }
}
