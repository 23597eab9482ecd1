//! Timestamp-named artifact files in a content directory.
//!
//! Files are created with create-new semantics. When two artifacts land in the
//! same second the later one gets a `_2`, `_3`, ... suffix instead of
//! overwriting the first.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use giftgen_core::error::{GiftGenError, Result};
use giftgen_core::types::ArtifactEntry;

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// A persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub path: PathBuf,
    /// Relative access path, e.g. `/music/music_20250101_120000.mp3`.
    pub url: String,
    pub size_bytes: u64,
}

/// A freshly created, still empty artifact file.
pub struct PendingArtifact {
    pub filename: String,
    pub path: PathBuf,
    pub file: File,
    url: String,
}

impl PendingArtifact {
    /// Flush and close the file, returning the finished artifact.
    ///
    /// On failure the partial file is removed.
    pub async fn finish(mut self) -> Result<Artifact> {
        match self.sync().await {
            Ok(size_bytes) => Ok(Artifact {
                filename: self.filename,
                path: self.path,
                url: self.url,
                size_bytes,
            }),
            Err(e) => {
                warn!(path = %self.path.display(), %e, "Failed to finish artifact");
                self.discard().await;
                Err(e.into())
            }
        }
    }

    async fn sync(&mut self) -> std::io::Result<u64> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(self.file.metadata().await?.len())
    }

    /// Remove a partially written file.
    pub async fn discard(self) {
        let Self { file, path, .. } = self;
        drop(file);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), %e, "Failed to remove partial artifact");
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    url_prefix: String,
    stem: String,
    extension: String,
}

impl ArtifactStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        url_prefix: impl Into<String>,
        stem: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
            stem: stem.into(),
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    /// `music_<ts>.mp3` files served under `/music`.
    pub fn music(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, "/music", "music", "mp3")
    }

    /// `video_<ts>.mp4` files served under `/videos`.
    pub fn video(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, "/videos", "video", "mp4")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn url_for(&self, filename: &str) -> String {
        format!("{}/{filename}", self.url_prefix)
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    fn candidate_name(&self, at: &DateTime<Local>, attempt: u32) -> String {
        let ts = at.format("%Y%m%d_%H%M%S");
        if attempt <= 1 {
            format!("{}_{ts}.{}", self.stem, self.extension)
        } else {
            format!("{}_{ts}_{attempt}.{}", self.stem, self.extension)
        }
    }

    /// Create a new, empty artifact file named after the current local time.
    pub async fn create(&self) -> Result<PendingArtifact> {
        self.create_at(Local::now()).await
    }

    async fn create_at(&self, at: DateTime<Local>) -> Result<PendingArtifact> {
        self.ensure_dir().await?;

        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let filename = self.candidate_name(&at, attempt);
            let path = self.dir.join(&filename);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    if attempt > 1 {
                        debug!(%filename, attempt, "Artifact name collision resolved with suffix");
                    }
                    return Ok(PendingArtifact {
                        url: self.url_for(&filename),
                        filename,
                        path,
                        file,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(GiftGenError::Other(anyhow::anyhow!(
            "could not find a free artifact name in {}",
            self.dir.display()
        )))
    }

    /// Write `bytes` to a new artifact.
    pub async fn save(&self, bytes: &[u8]) -> Result<Artifact> {
        let mut pending = self.create().await?;
        if let Err(e) = pending.file.write_all(bytes).await {
            pending.discard().await;
            return Err(e.into());
        }
        let artifact = pending.finish().await?;
        info!(
            filename = %artifact.filename,
            size = artifact.size_bytes,
            dir = %self.dir.display(),
            "Saved artifact"
        );
        Ok(artifact)
    }

    /// Artifacts with this store's extension, newest first.
    ///
    /// A missing directory lists as empty. Entries with equal modification
    /// times are ordered by name so repeated listings are identical.
    pub async fn list(&self) -> Result<Vec<ArtifactEntry>> {
        let mut reader = match tokio::fs::read_dir(&self.dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found: Vec<(SystemTime, ArtifactEntry)> = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                continue;
            };
            let modified = metadata.modified()?;
            found.push((
                modified,
                ArtifactEntry {
                    url: self.url_for(&filename),
                    created: iso_local(modified),
                    size_bytes: metadata.len(),
                    filename,
                },
            ));
        }

        found.sort_by(|(ta, a), (tb, b)| tb.cmp(ta).then_with(|| b.filename.cmp(&a.filename)));
        Ok(found.into_iter().map(|(_, entry)| entry).collect())
    }

    /// Path of an existing artifact. Rejects names that would escape the directory.
    pub async fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let is_plain = !filename.is_empty()
            && filename != "."
            && filename != ".."
            && !filename.contains(['/', '\\']);
        if !is_plain {
            return Err(GiftGenError::InvalidRequest(format!(
                "Invalid artifact name: {filename}"
            )));
        }
        let path = self.dir.join(filename);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(GiftGenError::NotFound(format!(
                "Audio file not found: {filename}"
            ))),
        }
    }

    /// If `reference` points at an artifact hosted by this server, return its name.
    ///
    /// Accepts the relative access path (`/music/x.mp3`) and, when the server's
    /// public origin is known, the absolute form (`http://host/music/x.mp3`).
    pub fn local_name(&self, reference: &str, public_base_url: Option<&str>) -> Option<String> {
        let path = match public_base_url {
            Some(base) if reference.starts_with(base) => &reference[base.len()..],
            _ => reference,
        };
        let name = path.strip_prefix(&self.url_prefix)?.strip_prefix('/')?;
        let name = name.split(['?', '#']).next().unwrap_or(name);
        (!name.is_empty()).then(|| name.to_string())
    }
}

fn iso_local(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}
