//! Prompt → (lyrics →) music → artifact.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{error, info, warn};

use giftgen_core::error::{GiftGenError, Result};
use giftgen_core::prompt::resolve_prompt;
use giftgen_core::types::{GenerateMusicRequest, GenerateMusicResponse, clamp_duration};
use giftgen_media::ArtifactStore;
use giftgen_providers::{AudioStream, LyricsProvider, MusicProvider};

pub const EMPTY_AUDIO_MESSAGE: &str = "No audio data was generated. Please try a different prompt.";

/// Which flow produced the music prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicMode {
    /// Lyrics are written first and sent to the music model.
    TwoStage,
    /// The prompt goes straight to the music model.
    SingleStage,
}

#[derive(Clone)]
pub struct MusicPipeline {
    lyrics: Option<Arc<dyn LyricsProvider>>,
    music: Option<Arc<dyn MusicProvider>>,
    store: ArtifactStore,
    mode: MusicMode,
}

impl MusicPipeline {
    pub fn new(
        lyrics: Option<Arc<dyn LyricsProvider>>,
        music: Option<Arc<dyn MusicProvider>>,
        store: ArtifactStore,
        mode: MusicMode,
    ) -> Self {
        Self {
            lyrics,
            music,
            store,
            mode,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn mode(&self) -> MusicMode {
        self.mode
    }

    pub fn music_configured(&self) -> bool {
        self.music.is_some()
    }

    /// Handle a `generate-music` request with the configured mode.
    pub async fn generate(&self, request: &GenerateMusicRequest) -> Result<GenerateMusicResponse> {
        let prompt = resolve_prompt(request.prompt.as_deref(), request.brief.as_ref())?;
        self.run(&prompt, request.duration_seconds, self.mode).await
    }

    /// Generate a track for `prompt`, clamping the requested duration.
    pub async fn run(
        &self,
        prompt: &str,
        duration_seconds: i64,
        mode: MusicMode,
    ) -> Result<GenerateMusicResponse> {
        let music = self.music.as_ref().ok_or_else(|| {
            GiftGenError::NotConfigured(
                "Music generation is not available. ELEVENLABS_API_KEY is not configured.".into(),
            )
        })?;

        let secs = clamp_duration(duration_seconds);
        if secs as i64 != duration_seconds {
            info!(requested = duration_seconds, effective = secs, "Clamped music duration");
        }

        let (music_prompt, lyrics) = match mode {
            MusicMode::TwoStage => {
                let lyrics = self.write_lyrics(prompt).await?;
                (lyrics.clone(), Some(lyrics))
            }
            MusicMode::SingleStage => (prompt.to_string(), None),
        };

        info!(provider = music.id(), secs, ?mode, "Generating music");
        let stream = music
            .compose(&music_prompt, Duration::from_secs(secs as u64))
            .await
            .inspect_err(|e| error!(%e, "Music vendor call failed"))?;
        let audio = collect_audio(stream).await?;
        if audio.is_empty() {
            warn!("Music vendor returned no audio");
            return Err(GiftGenError::EmptyResult(EMPTY_AUDIO_MESSAGE.into()));
        }

        let artifact = self.store.save(&audio).await?;
        Ok(GenerateMusicResponse {
            success: true,
            message: format!("Music generated successfully! Duration: {secs} seconds."),
            filename: Some(artifact.filename),
            file_url: Some(artifact.url),
            lyrics,
            prompt: match mode {
                MusicMode::SingleStage => Some(prompt.to_string()),
                MusicMode::TwoStage => None,
            },
        })
    }

    async fn write_lyrics(&self, prompt: &str) -> Result<String> {
        let lyrics = self.lyrics.as_ref().ok_or_else(|| {
            GiftGenError::NotConfigured(
                "Lyrics generation is not available. OPENAI_API_KEY is not configured.".into(),
            )
        })?;
        lyrics
            .write_lyrics(prompt)
            .await
            .inspect_err(|e| error!(%e, "Lyrics generation failed"))
    }
}

/// Concatenate streamed chunks in arrival order.
pub async fn collect_audio(mut stream: AudioStream) -> Result<Vec<u8>> {
    let mut audio = Vec::new();
    while let Some(chunk) = stream.next().await {
        audio.extend_from_slice(&chunk?);
    }
    Ok(audio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;

    struct FakeLyrics {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LyricsProvider for FakeLyrics {
        fn id(&self) -> &str {
            "fake-lyrics"
        }

        async fn write_lyrics(&self, prompt: &str) -> Result<String> {
            self.seen.lock().unwrap().push(prompt.to_string());
            Ok("[Verse 1]\nHappy birthday".into())
        }
    }

    struct FakeMusic {
        chunks: Vec<&'static [u8]>,
        requests: Mutex<Vec<(String, Duration)>>,
    }

    #[async_trait]
    impl MusicProvider for FakeMusic {
        fn id(&self) -> &str {
            "fake-music"
        }

        async fn compose(&self, prompt: &str, length: Duration) -> Result<AudioStream> {
            self.requests.lock().unwrap().push((prompt.to_string(), length));
            let chunks: Vec<Result<Bytes>> = self
                .chunks
                .iter()
                .map(|c| Ok(Bytes::from_static(*c)))
                .collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }

    fn fake_music(chunks: Vec<&'static [u8]>) -> Arc<FakeMusic> {
        Arc::new(FakeMusic {
            chunks,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn fake_lyrics() -> Arc<FakeLyrics> {
        Arc::new(FakeLyrics {
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_end_to_end_clamps_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let music = fake_music(vec![&b"ID3"[..], &b"-chunk-1"[..], &b"-chunk-2"[..]]);
        let lyrics = fake_lyrics();
        let pipeline = MusicPipeline::new(
            Some(lyrics.clone()),
            Some(music.clone()),
            ArtifactStore::music(dir.path()),
            MusicMode::TwoStage,
        );

        let request = GenerateMusicRequest {
            prompt: Some("upbeat synth pop".into()),
            brief: None,
            duration_seconds: 200,
        };
        let response = pipeline.generate(&request).await.unwrap();

        assert!(response.success);
        assert_eq!(response.message, "Music generated successfully! Duration: 120 seconds.");
        let filename = response.filename.unwrap();
        let pattern = regex::Regex::new(r"^music_\d{8}_\d{6}\.mp3$").unwrap();
        assert!(pattern.is_match(&filename), "unexpected name {filename}");
        assert_eq!(response.file_url.unwrap(), format!("/music/{filename}"));
        assert_eq!(response.lyrics.as_deref(), Some("[Verse 1]\nHappy birthday"));

        let requests = music.requests.lock().unwrap();
        assert_eq!(requests[0].1, Duration::from_secs(120));
        assert_eq!(requests[0].0, "[Verse 1]\nHappy birthday");
        assert_eq!(lyrics.seen.lock().unwrap()[0], "upbeat synth pop");

        let saved = std::fs::read(dir.path().join(&filename)).unwrap();
        assert_eq!(saved, b"ID3-chunk-1-chunk-2");
    }

    #[tokio::test]
    async fn test_single_stage_skips_lyrics() {
        let dir = tempfile::tempdir().unwrap();
        let music = fake_music(vec![&b"abc"[..]]);
        let pipeline = MusicPipeline::new(
            None,
            Some(music.clone()),
            ArtifactStore::music(dir.path()),
            MusicMode::SingleStage,
        );

        let response = pipeline.run("lofi beat", 3, MusicMode::SingleStage).await.unwrap();
        assert!(response.lyrics.is_none());
        assert_eq!(response.prompt.as_deref(), Some("lofi beat"));
        assert_eq!(music.requests.lock().unwrap()[0].1, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_zero_chunks_is_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = MusicPipeline::new(
            None,
            Some(fake_music(vec![])),
            ArtifactStore::music(dir.path()),
            MusicMode::SingleStage,
        );

        let err = pipeline.run("x", 30, MusicMode::SingleStage).await.unwrap_err();
        assert!(matches!(err, GiftGenError::EmptyResult(ref m) if m == EMPTY_AUDIO_MESSAGE));
        assert!(pipeline.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_music_key_is_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = MusicPipeline::new(
            Some(fake_lyrics()),
            None,
            ArtifactStore::music(dir.path()),
            MusicMode::TwoStage,
        );
        let err = pipeline.run("x", 30, MusicMode::TwoStage).await.unwrap_err();
        assert!(matches!(err, GiftGenError::NotConfigured(ref m) if m.contains("ELEVENLABS_API_KEY")));
    }

    #[tokio::test]
    async fn test_missing_lyrics_key_stays_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = MusicPipeline::new(
            None,
            Some(fake_music(vec![&b"abc"[..]])),
            ArtifactStore::music(dir.path()),
            MusicMode::TwoStage,
        );
        let err = pipeline.run("x", 30, MusicMode::TwoStage).await.unwrap_err();
        assert!(matches!(err, GiftGenError::NotConfigured(ref m) if m.contains("OPENAI_API_KEY")));
    }

    #[tokio::test]
    async fn test_blank_prompt_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = MusicPipeline::new(
            None,
            Some(fake_music(vec![&b"abc"[..]])),
            ArtifactStore::music(dir.path()),
            MusicMode::SingleStage,
        );
        let request = GenerateMusicRequest {
            prompt: Some("   ".into()),
            brief: None,
            duration_seconds: 30,
        };
        let err = pipeline.generate(&request).await.unwrap_err();
        assert!(matches!(err, GiftGenError::InvalidRequest(_)));
    }
}
