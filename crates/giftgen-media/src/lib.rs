//! Media handling: artifact persistence, downloads, audio clipping.

pub mod artifact_store;
pub mod audio_clip;
pub mod download;

pub use artifact_store::{Artifact, ArtifactStore, PendingArtifact};
pub use audio_clip::{AudioClipper, FfmpegClipper};
pub use download::download_to_store;
