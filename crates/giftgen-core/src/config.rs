//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_LYRICS_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_LYRICS_TEMPERATURE: f64 = 0.9;
pub const DEFAULT_MUSIC_MODEL: &str = "music_v1";
pub const DEFAULT_MUSIC_OUTPUT_FORMAT: &str = "mp3_44100_128";
pub const DEFAULT_VIDEO_MODEL: &str = "fal-ai/ai-avatar";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_VIDEO_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_AUDIO_CLIP_SECS: u64 = 5;
pub const DEFAULT_VIDEO_PROMPT: &str =
    "A person singing a happy birthday song with joyful expressions and natural lip sync";

/// Top-level GiftGen configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<LyricsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<MusicConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// Externally visible origin of this server (e.g. "http://localhost:8000").
    /// Absolute artifact URLs under this origin are treated as local.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_dir: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_dir: Option<String>,
}

/// Lyrics generation (OpenAI chat completions).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LyricsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Music generation (ElevenLabs music API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Output format (default: "mp3_44100_128").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,

    /// Write lyrics first and feed them to the music model (default: true).
    #[serde(default = "default_true")]
    pub lyrics_stage: bool,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: None,
            base_url: None,
            model: None,
            output_format: None,
            lyrics_stage: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Video generation (fal queue API + fal storage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_base_url: Option<String>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_video_timeout")]
    pub timeout_secs: u64,

    /// Local audio is clipped to this many seconds before upload.
    #[serde(default = "default_audio_clip")]
    pub audio_clip_secs: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_resolution: Option<String>,

    /// Scene description sent along with every video job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: None,
            model: None,
            queue_base_url: None,
            storage_base_url: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            timeout_secs: DEFAULT_VIDEO_TIMEOUT_SECS,
            audio_clip_secs: DEFAULT_AUDIO_CLIP_SECS,
            ffmpeg_path: None,
            default_resolution: None,
            prompt: None,
        }
    }
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_video_timeout() -> u64 {
    DEFAULT_VIDEO_TIMEOUT_SECS
}

fn default_audio_clip() -> u64 {
    DEFAULT_AUDIO_CLIP_SECS
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "giftgen_jobs=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

/// Like [`resolve_secret_field`], falling back to the vendor's conventional variable.
fn resolve_with_fallback(
    direct: &Option<String>,
    env_var: &Option<String>,
    conventional: &str,
) -> Option<String> {
    resolve_secret_field(direct, env_var)
        .or_else(|| std::env::var(conventional).ok().filter(|v| !v.is_empty()))
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex");
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

fn expand_dir(dir: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(dir).as_ref())
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::GiftGenError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file location: `~/.giftgen/config.json`.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn gateway_port(&self) -> u16 {
        self.gateway.as_ref().map(|g| g.port).unwrap_or(DEFAULT_PORT)
    }

    pub fn bind_addr(&self) -> String {
        self.gateway
            .as_ref()
            .and_then(|g| g.bind.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    pub fn public_base_url(&self) -> Option<String> {
        self.gateway
            .as_ref()
            .and_then(|g| g.public_base_url.as_deref())
            .map(|u| u.trim_end_matches('/').to_string())
    }

    pub fn music_dir(&self) -> PathBuf {
        self.storage
            .as_ref()
            .and_then(|s| s.music_dir.as_deref())
            .map(expand_dir)
            .unwrap_or_else(|| PathBuf::from("generated_music"))
    }

    pub fn video_dir(&self) -> PathBuf {
        self.storage
            .as_ref()
            .and_then(|s| s.video_dir.as_deref())
            .map(expand_dir)
            .unwrap_or_else(|| PathBuf::from("generated_videos"))
    }

    pub fn lyrics_api_key(&self) -> Option<String> {
        let c = self.lyrics.clone().unwrap_or_default();
        resolve_with_fallback(&c.api_key, &c.api_key_env, "OPENAI_API_KEY")
    }

    pub fn music_api_key(&self) -> Option<String> {
        let c = self.music.clone().unwrap_or_default();
        resolve_with_fallback(&c.api_key, &c.api_key_env, "ELEVENLABS_API_KEY")
    }

    pub fn video_api_key(&self) -> Option<String> {
        let c = self.video.clone().unwrap_or_default();
        resolve_with_fallback(&c.api_key, &c.api_key_env, "FAL_KEY")
    }

    pub fn lyrics_model(&self) -> String {
        self.lyrics
            .as_ref()
            .and_then(|l| l.model.clone())
            .unwrap_or_else(|| DEFAULT_LYRICS_MODEL.to_string())
    }

    pub fn lyrics_temperature(&self) -> f64 {
        self.lyrics
            .as_ref()
            .and_then(|l| l.temperature)
            .unwrap_or(DEFAULT_LYRICS_TEMPERATURE)
    }

    pub fn music_model(&self) -> String {
        self.music
            .as_ref()
            .and_then(|m| m.model.clone())
            .unwrap_or_else(|| DEFAULT_MUSIC_MODEL.to_string())
    }

    pub fn music_output_format(&self) -> String {
        self.music
            .as_ref()
            .and_then(|m| m.output_format.clone())
            .unwrap_or_else(|| DEFAULT_MUSIC_OUTPUT_FORMAT.to_string())
    }

    /// Whether the music endpoint writes lyrics before composing.
    pub fn lyrics_stage(&self) -> bool {
        self.music.as_ref().map(|m| m.lyrics_stage).unwrap_or(true)
    }

    pub fn video_model(&self) -> String {
        self.video
            .as_ref()
            .and_then(|v| v.model.clone())
            .unwrap_or_else(|| DEFAULT_VIDEO_MODEL.to_string())
    }

    pub fn video_poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.video
                .as_ref()
                .map(|v| v.poll_interval_secs)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        )
    }

    pub fn video_timeout(&self) -> Duration {
        Duration::from_secs(
            self.video
                .as_ref()
                .map(|v| v.timeout_secs)
                .unwrap_or(DEFAULT_VIDEO_TIMEOUT_SECS),
        )
    }

    pub fn audio_clip(&self) -> Duration {
        Duration::from_secs(
            self.video
                .as_ref()
                .map(|v| v.audio_clip_secs)
                .unwrap_or(DEFAULT_AUDIO_CLIP_SECS),
        )
    }

    pub fn ffmpeg_path(&self) -> String {
        self.video
            .as_ref()
            .and_then(|v| v.ffmpeg_path.clone())
            .unwrap_or_else(|| "ffmpeg".to_string())
    }

    pub fn video_prompt(&self) -> String {
        self.video
            .as_ref()
            .and_then(|v| v.prompt.clone())
            .unwrap_or_else(|| DEFAULT_VIDEO_PROMPT.to_string())
    }

    pub fn default_resolution(&self) -> Option<String> {
        self.video.as_ref().and_then(|v| v.default_resolution.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if self.music_api_key().is_none() {
            warnings.push(
                "ELEVENLABS_API_KEY not found. Music generation will not be available.".into(),
            );
        }
        if self.lyrics_api_key().is_none() {
            warnings.push("OPENAI_API_KEY not found. Lyrics generation will not be available.".into());
        }
        if self.video_api_key().is_none() {
            warnings.push("FAL_KEY not found. Video generation will not be available.".into());
        }

        if let Some(gw) = &self.gateway {
            if gw.port == 0 {
                errors.push("Gateway port cannot be 0".to_string());
            }
        }

        if let Some(video) = &self.video {
            if video.poll_interval_secs == 0 {
                errors.push("video.poll_interval_secs cannot be 0".to_string());
            }
            if video.timeout_secs < video.poll_interval_secs {
                errors.push(format!(
                    "video.timeout_secs ({}) is shorter than video.poll_interval_secs ({})",
                    video.timeout_secs, video.poll_interval_secs
                ));
            }
        }

        (warnings, errors)
    }
}

/// Base directory for GiftGen data: `~/.giftgen/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".giftgen")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_GG_KEY", "sk-test-123") };
        let input = r#"{"key": "${TEST_GG_KEY}", "other": "plain"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains("sk-test-123"));
        assert!(result.contains("plain"));
        unsafe { std::env::remove_var("TEST_GG_KEY") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"key": "${NONEXISTENT_VAR_GG_TEST}"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains(r#""""#));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway_port(), 8000);
        assert_eq!(config.music_dir(), PathBuf::from("generated_music"));
        assert_eq!(config.video_dir(), PathBuf::from("generated_videos"));
        assert_eq!(config.video_poll_interval(), Duration::from_secs(5));
        assert_eq!(config.video_timeout(), Duration::from_secs(300));
        assert_eq!(config.audio_clip(), Duration::from_secs(5));
        assert_eq!(config.lyrics_model(), "gpt-4o-mini");
        assert!(config.lyrics_stage());
    }

    #[test]
    fn test_secret_resolution_order() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_GG_MUSIC_KEY", "from-env") };
        let config = Config {
            music: Some(MusicConfig {
                api_key_env: Some("TEST_GG_MUSIC_KEY".into()),
                ..MusicConfig::default()
            }),
            ..Config::default()
        };
        assert_eq!(config.music_api_key(), Some("from-env".into()));

        let config = Config {
            music: Some(MusicConfig {
                api_key: Some("direct-key".into()),
                api_key_env: Some("TEST_GG_MUSIC_KEY".into()),
                ..MusicConfig::default()
            }),
            ..Config::default()
        };
        // Direct key takes priority
        assert_eq!(config.music_api_key(), Some("direct-key".into()));
        unsafe { std::env::remove_var("TEST_GG_MUSIC_KEY") };
    }

    #[test]
    fn test_empty_secret_is_absent() {
        assert_eq!(resolve_secret_field(&Some(String::new()), &None), None);
    }

    #[test]
    fn test_video_section_defaults() {
        let config: Config = json5::from_str(r#"{ video: { model: "fal-ai/test" } }"#).unwrap();
        let video = config.video.as_ref().unwrap();
        assert_eq!(video.poll_interval_secs, 5);
        assert_eq!(video.timeout_secs, 300);
        assert_eq!(config.video_model(), "fal-ai/test");
    }

    #[test]
    fn test_single_stage_music() {
        let config: Config = json5::from_str(r#"{ music: { lyrics_stage: false } }"#).unwrap();
        assert!(!config.lyrics_stage());
    }

    #[test]
    fn test_logging_config_defaults() {
        let config: Config = json5::from_str(r#"{ "logging": {} }"#).unwrap();
        let logging = config.logging.expect("logging should be present");
        assert_eq!(logging.format, "plain");
        assert!(logging.level.is_none());
        assert_eq!(logging.output, "stderr");
        assert!(logging.filters.is_empty());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.json")).unwrap();
        assert!(config.gateway.is_none());
    }

    #[test]
    fn test_load_json5_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                // comments are allowed
                gateway: { port: 9100, public_base_url: "http://localhost:9100/" },
                storage: { music_dir: "/tmp/gg-music" },
            }"#,
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.gateway_port(), 9100);
        assert_eq!(config.public_base_url().as_deref(), Some("http://localhost:9100"));
        assert_eq!(config.music_dir(), PathBuf::from("/tmp/gg-music"));
    }

    #[test]
    fn test_validate_bad_polling_errors() {
        let config = Config {
            video: Some(VideoConfig {
                poll_interval_secs: 10,
                timeout_secs: 5,
                ..VideoConfig::default()
            }),
            ..Config::default()
        };
        let (_warnings, errors) = config.validate();
        assert!(
            errors.iter().any(|e| e.contains("timeout_secs")),
            "Expected a timeout error, got: {errors:?}"
        );
    }

    #[test]
    fn test_validate_zero_port_errors() {
        let config = Config {
            gateway: Some(GatewayConfig {
                port: 0,
                bind: None,
                public_base_url: None,
            }),
            ..Config::default()
        };
        let (_warnings, errors) = config.validate();
        assert!(errors.iter().any(|e| e.contains("port")));
    }
}
