//! JSON endpoint handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde_json::{Value, json};
use tracing::info;

use giftgen_core::prompt::SongBrief;
use giftgen_core::types::{
    ArtifactListing, ComposePromptResponse, GenerateMusicRequest, GenerateMusicResponse,
    GenerateVideoRequest, GenerateVideoResponse, ServiceDescriptor,
};

use crate::error::ApiError;
use crate::state::GatewayState;

/// Unwrap a JSON body, reporting malformed input in the common error shape.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

pub async fn root(State(state): State<Arc<GatewayState>>) -> Json<ServiceDescriptor> {
    Json(state.descriptor())
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn generate_music(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<GenerateMusicRequest>, JsonRejection>,
) -> Result<Json<GenerateMusicResponse>, ApiError> {
    let request = body(payload)?;
    let timer = crate::GenerationTimer::start("music");
    let result = state.orchestrator.music.generate(&request).await;
    timer.finish(&result);
    Ok(Json(result?))
}

pub async fn list_music(
    State(state): State<Arc<GatewayState>>,
) -> Result<Json<ArtifactListing>, ApiError> {
    let files = state.orchestrator.music.store().list().await?;
    Ok(Json(ArtifactListing { files }))
}

pub async fn generate_video(
    State(state): State<Arc<GatewayState>>,
    payload: Result<Json<GenerateVideoRequest>, JsonRejection>,
) -> Result<Json<GenerateVideoResponse>, ApiError> {
    let request = body(payload)?;
    let cancel = state.shutdown.child_token();
    info!(
        audio_url = %request.audio_url,
        image_url = %request.image_url,
        "Video generation requested"
    );

    let timer = crate::GenerationTimer::start("video");
    let result = state.orchestrator.video.generate(&request, &cancel).await;
    timer.finish(&result);
    Ok(Json(result?))
}

pub async fn list_videos(
    State(state): State<Arc<GatewayState>>,
) -> Result<Json<ArtifactListing>, ApiError> {
    let files = state.orchestrator.video.video_store().list().await?;
    Ok(Json(ArtifactListing { files }))
}

pub async fn compose_prompt(
    payload: Result<Json<SongBrief>, JsonRejection>,
) -> Result<Json<ComposePromptResponse>, ApiError> {
    let brief = body(payload)?;
    brief.validate()?;
    Ok(Json(ComposePromptResponse {
        prompt: brief.render(),
    }))
}
