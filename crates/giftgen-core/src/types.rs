//! Request and response bodies shared by the HTTP surface, the jobs crate and the CLI.

use serde::{Deserialize, Serialize};

use crate::prompt::SongBrief;

pub const MIN_DURATION_SECS: u32 = 10;
pub const MAX_DURATION_SECS: u32 = 120;
pub const DEFAULT_DURATION_SECS: i64 = 30;

/// Clamp a requested track length into `[10, 120]` seconds.
pub fn clamp_duration(requested: i64) -> u32 {
    requested.clamp(MIN_DURATION_SECS as i64, MAX_DURATION_SECS as i64) as u32
}

fn default_duration() -> i64 {
    DEFAULT_DURATION_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateMusicRequest {
    /// Free-text prompt. Exactly one of `prompt` and `brief` must be set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief: Option<SongBrief>,

    #[serde(default = "default_duration")]
    pub duration_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateMusicResponse {
    pub success: bool,
    pub message: String,
    pub filename: Option<String>,
    pub file_url: Option<String>,
    pub lyrics: Option<String>,
    /// Echo of the prompt when the single-stage pipeline was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Output resolution accepted by the video model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P480 => "480p",
            Self::P720 => "720p",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "480p" => Some(Self::P480),
            "720p" => Some(Self::P720),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateVideoRequest {
    pub audio_url: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateVideoResponse {
    pub success: bool,
    pub message: String,
    pub filename: Option<String>,
    pub file_url: Option<String>,
    /// Remote URL of the video as hosted by the vendor.
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadImageResponse {
    pub success: bool,
    pub image_url: String,
    pub message: String,
}

/// One entry of a listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub filename: String,
    pub url: String,
    /// Modification time, ISO-8601 local time.
    pub created: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactListing {
    pub files: Vec<ArtifactEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposePromptResponse {
    pub prompt: String,
}

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub service: String,
    pub status: String,
    pub version: String,
    pub elevenlabs_configured: bool,
    pub openai_configured: bool,
    pub fal_configured: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_duration_bounds() {
        assert_eq!(clamp_duration(200), 120);
        assert_eq!(clamp_duration(120), 120);
        assert_eq!(clamp_duration(30), 30);
        assert_eq!(clamp_duration(10), 10);
        assert_eq!(clamp_duration(3), 10);
        assert_eq!(clamp_duration(-5), 10);
        assert_eq!(clamp_duration(i64::MAX), 120);
    }

    #[test]
    fn test_clamp_matches_min_max_formula() {
        for d in -50..300 {
            let expected = 10.max(d.min(120)) as u32;
            assert_eq!(clamp_duration(d), expected, "duration {d}");
        }
    }

    #[test]
    fn test_music_request_default_duration() {
        let req: GenerateMusicRequest =
            serde_json::from_str(r#"{"prompt": "upbeat synth pop"}"#).unwrap();
        assert_eq!(req.duration_seconds, 30);
        assert!(req.brief.is_none());
    }

    #[test]
    fn test_resolution_wire_names() {
        let req: GenerateVideoRequest = serde_json::from_str(
            r#"{"audio_url": "/music/a.mp3", "image_url": "https://x/i.png", "resolution": "720p"}"#,
        )
        .unwrap();
        assert_eq!(req.resolution, Some(Resolution::P720));
        assert_eq!(Resolution::default().as_str(), "480p");
        assert_eq!(Resolution::parse("1080p"), None);
    }

    #[test]
    fn test_music_response_keeps_null_fields() {
        let resp = GenerateMusicResponse {
            success: true,
            message: "ok".into(),
            filename: None,
            file_url: None,
            lyrics: None,
            prompt: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("lyrics").unwrap().is_null());
        assert!(json.get("prompt").is_none());
    }
}
