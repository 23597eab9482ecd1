//! Image upload: one multipart file, forwarded to vendor storage.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, State};
use tracing::{debug, info};

use giftgen_core::types::UploadImageResponse;

use crate::error::ApiError;
use crate::state::GatewayState;

/// Maximum upload file size: 10 MiB.
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Detects content type from the first bytes of a file.
pub fn detect_content_type(data: &[u8]) -> Option<&'static str> {
    if data.len() >= 3 && data[..3] == [0xFF, 0xD8, 0xFF] {
        Some("image/jpeg")
    } else if data.len() >= 8 && data[..8] == [137, 80, 78, 71, 13, 10, 26, 10] {
        Some("image/png")
    } else if data.len() >= 4 && &data[..4] == b"GIF8" {
        Some("image/gif")
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

fn ext_from_content_type(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Upload name: the client's base name if it has one, otherwise a random one,
/// with the extension matching the detected type.
fn upload_name(client_name: Option<&str>, content_type: &str) -> String {
    let ext = ext_from_content_type(content_type);
    let stem = client_name
        .and_then(|n| n.rsplit(['/', '\\']).next())
        .and_then(|n| n.split('.').next())
        .map(|s| {
            s.chars()
                .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
                .collect::<String>()
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
    format!("{stem}.{ext}")
}

pub async fn upload_image(
    State(state): State<Arc<GatewayState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadImageResponse>, ApiError> {
    let mut file: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart: {e}")))?
    {
        if field.file_name().is_none() && field.name() != Some("file") {
            continue;
        }
        if file.is_some() {
            return Err(ApiError::bad_request("exactly one file must be uploaded"));
        }
        let client_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError {
                status: e.status(),
                detail: format!("file read error: {}", e.body_text()),
            })?;
        file = Some((client_name, bytes.to_vec()));
    }

    let (client_name, bytes) = file.ok_or_else(|| ApiError::bad_request("no file uploaded"))?;
    if bytes.is_empty() {
        return Err(ApiError::bad_request("uploaded file is empty"));
    }
    if bytes.len() > MAX_UPLOAD_SIZE {
        return Err(ApiError::payload_too_large(format!(
            "file exceeds maximum size of {} bytes",
            MAX_UPLOAD_SIZE
        )));
    }
    let content_type = detect_content_type(&bytes).ok_or_else(|| {
        ApiError::bad_request("unsupported image type; allowed: jpeg, png, gif, webp")
    })?;

    let file_name = upload_name(client_name.as_deref(), content_type);
    debug!(%file_name, content_type, size = bytes.len(), "Uploading image");

    let image_url = state
        .orchestrator
        .video
        .upload(bytes, &file_name, content_type)
        .await?;
    info!(%file_name, %image_url, "Image uploaded");

    Ok(Json(UploadImageResponse {
        success: true,
        image_url,
        message: "Image uploaded successfully".into(),
    }))
}
