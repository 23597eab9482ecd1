//! Provider integration tests.
//!
//! The `mock_*` tests run each client against a local axum stand-in for the
//! vendor. The `live_*` tests make real API calls and are skipped when the
//! corresponding API key env var is not set.
//! Run with: `cargo test -p giftgen-providers --test integration`

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::{Value, json};

use giftgen_core::error::GiftGenError;
use giftgen_core::types::Resolution;
use giftgen_providers::elevenlabs::ElevenLabsMusic;
use giftgen_providers::fal::FalClient;
use giftgen_providers::openai::OpenAiLyrics;
use giftgen_providers::{
    LyricsProvider, MediaUploader, MusicProvider, VendorStatus, VideoJobSpec, VideoProvider,
    extract_video_url,
};

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|k| !k.is_empty())
}

/// Serve `router` on an ephemeral port and return its base URL.
async fn spawn_mock(router: Router<String>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let app = router.with_state(base.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    base
}

async fn chat_completions() -> ([(&'static str, &'static str); 1], String) {
    let body = [
        r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
        r#"data: {"choices":[{"delta":{"content":"[Verse 1]\n"}}]}"#,
        r#"data: {"choices":[{"delta":{"content":"Happy day"}}]}"#,
        "data: [DONE]",
    ]
    .join("\n\n")
        + "\n\n";
    ([("content-type", "text/event-stream")], body)
}

async fn music_stream() -> Vec<u8> {
    vec![0xFF, 0xFB, 0x90, 0x44, 0x00, 0x01, 0x02, 0x03]
}

async fn fal_submit(Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["resolution"], "480p");
    assert!(body["image_url"].as_str().unwrap().starts_with("https://"));
    Json(json!({"request_id": "req-42"}))
}

async fn fal_status() -> Json<Value> {
    Json(json!({"status": "COMPLETED"}))
}

async fn fal_result() -> Json<Value> {
    Json(json!({"video": {"url": "https://cdn.example/out.mp4"}}))
}

async fn storage_initiate(State(base): State<String>, Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["content_type"], "image/png");
    Json(json!({
        "upload_url": format!("{base}/upload/slot-1"),
        "file_url": "https://cdn.example/face.png",
    }))
}

async fn storage_put(body: axum::body::Bytes) -> StatusCode {
    if body.is_empty() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    }
}

#[tokio::test]
async fn mock_lyrics_collects_streamed_deltas() {
    let base = spawn_mock(Router::new().route("/v1/chat/completions", post(chat_completions))).await;
    let client = OpenAiLyrics::new("sk-test".into(), Some(&base), "gpt-4o-mini".into(), 0.9);

    let lyrics = client.write_lyrics("a song for Maya").await.unwrap();
    assert_eq!(lyrics, "[Verse 1]\nHappy day");
}

#[tokio::test]
async fn mock_lyrics_vendor_error_carries_status() {
    let base = spawn_mock(Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
    ))
    .await;
    let client = OpenAiLyrics::new("sk-bad".into(), Some(&base), "gpt-4o-mini".into(), 0.9);

    let err = client.write_lyrics("x").await.unwrap_err();
    assert!(matches!(err, GiftGenError::Vendor { .. }));
    assert!(err.to_string().contains("401"), "got: {err}");
}

#[tokio::test]
async fn mock_music_streams_bytes() {
    let base = spawn_mock(Router::new().route("/v1/music/stream", post(music_stream))).await;
    let client = ElevenLabsMusic::new(
        "xi-test".into(),
        Some(&base),
        "music_v1".into(),
        "mp3_44100_128".into(),
    );

    let mut stream = client
        .compose("upbeat pop", Duration::from_secs(30))
        .await
        .unwrap();
    let mut audio = Vec::new();
    while let Some(chunk) = stream.next().await {
        audio.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(audio.len(), 8);
    assert_eq!(&audio[..2], &[0xFF, 0xFB]);
}

#[tokio::test]
async fn mock_video_queue_round_trip() {
    let base = spawn_mock(
        Router::new()
            .route("/fal-ai/ai-avatar", post(fal_submit))
            .route("/fal-ai/ai-avatar/requests/{id}/status", get(fal_status))
            .route("/fal-ai/ai-avatar/requests/{id}", get(fal_result)),
    )
    .await;
    let client = FalClient::new("fk".into(), Some(&base), Some(&base), "fal-ai/ai-avatar".into());

    let ticket = client
        .submit(&VideoJobSpec {
            image_url: "https://cdn.example/face.png".into(),
            audio_url: "https://cdn.example/clip.mp3".into(),
            prompt: "singing".into(),
            resolution: Resolution::P480,
        })
        .await
        .unwrap();
    assert_eq!(ticket.request_id, "req-42");

    assert_eq!(client.status(&ticket).await.unwrap(), VendorStatus::Completed);
    let descriptor = client.result(&ticket).await.unwrap();
    assert_eq!(
        extract_video_url(&descriptor).as_deref(),
        Some("https://cdn.example/out.mp4")
    );
}

#[tokio::test]
async fn mock_video_unknown_status_is_rejected() {
    let base = spawn_mock(
        Router::new()
            .route("/fal-ai/ai-avatar", post(fal_submit))
            .route(
                "/fal-ai/ai-avatar/requests/{id}/status",
                get(|| async { Json(json!({"status": "HIBERNATING"})) }),
            ),
    )
    .await;
    let client = FalClient::new("fk".into(), Some(&base), Some(&base), "fal-ai/ai-avatar".into());
    let ticket = client
        .submit(&VideoJobSpec {
            image_url: "https://cdn.example/face.png".into(),
            audio_url: "https://cdn.example/clip.mp3".into(),
            prompt: "singing".into(),
            resolution: Resolution::P480,
        })
        .await
        .unwrap();

    let err = client.status(&ticket).await.unwrap_err();
    assert!(matches!(err, GiftGenError::UnrecognizedStatus(ref s) if s == "HIBERNATING"));
}

#[tokio::test]
async fn mock_storage_upload_returns_file_url() {
    let base = spawn_mock(
        Router::new()
            .route("/storage/upload/initiate", post(storage_initiate))
            .route("/upload/slot-1", put(storage_put)),
    )
    .await;
    let client = FalClient::new("fk".into(), Some(&base), Some(&base), "fal-ai/ai-avatar".into());

    let url = client
        .upload(vec![0x89, b'P', b'N', b'G'], "face.png", "image/png")
        .await
        .unwrap();
    assert_eq!(url, "https://cdn.example/face.png");
}

#[tokio::test]
async fn live_openai_lyrics() {
    let Some(api_key) = env_key("OPENAI_API_KEY") else {
        eprintln!("Skipping: OPENAI_API_KEY not set");
        return;
    };
    let client = OpenAiLyrics::new(api_key, None, "gpt-4o-mini".into(), 0.9);
    let lyrics = client
        .write_lyrics("A short birthday song for Sam, a cheerful coworker.")
        .await
        .expect("lyrics request failed");
    assert!(!lyrics.is_empty());
}

#[tokio::test]
async fn live_elevenlabs_music() {
    let Some(api_key) = env_key("ELEVENLABS_API_KEY") else {
        eprintln!("Skipping: ELEVENLABS_API_KEY not set");
        return;
    };
    let client = ElevenLabsMusic::new(api_key, None, "music_v1".into(), "mp3_44100_128".into());
    let mut stream = client
        .compose("A short cheerful ukulele jingle", Duration::from_secs(10))
        .await
        .expect("music request failed");
    let mut total = 0usize;
    while let Some(chunk) = stream.next().await {
        total += chunk.expect("music chunk error").len();
    }
    assert!(total > 0, "No audio bytes received");
}
