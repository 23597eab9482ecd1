//! Mapping of [`GiftGenError`] onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

use giftgen_core::error::GiftGenError;

/// Error body returned by every endpoint: `{"success": false, "detail": "..."}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    detail: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn payload_too_large(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            detail: detail.into(),
        }
    }
}

pub fn status_for(err: &GiftGenError) -> StatusCode {
    match err {
        GiftGenError::NotConfigured(_) | GiftGenError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        GiftGenError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        GiftGenError::NotFound(_) => StatusCode::NOT_FOUND,
        GiftGenError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        GiftGenError::UnrecognizedStatus(_) | GiftGenError::Download(_) => StatusCode::BAD_GATEWAY,
        GiftGenError::Vendor { .. }
        | GiftGenError::EmptyResult(_)
        | GiftGenError::JobFailed(_)
        | GiftGenError::Media(_)
        | GiftGenError::Config(_)
        | GiftGenError::Io(_)
        | GiftGenError::Json(_)
        | GiftGenError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<GiftGenError> for ApiError {
    fn from(err: GiftGenError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            error!(kind = err.kind(), %status, "{err}");
        } else {
            warn!(kind = err.kind(), %status, "{err}");
        }
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            success: false,
            detail: self.detail,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (GiftGenError::NotConfigured("x".into()), 503),
            (GiftGenError::InvalidRequest("x".into()), 400),
            (GiftGenError::vendor("Music generation failed", "boom"), 500),
            (GiftGenError::EmptyResult("x".into()), 500),
            (GiftGenError::Timeout { elapsed_secs: 305 }, 504),
            (GiftGenError::Download("x".into()), 502),
            (GiftGenError::UnrecognizedStatus("PAUSED".into()), 502),
            (GiftGenError::NotFound("x".into()), 404),
            (GiftGenError::Cancelled, 503),
        ];
        for (err, code) in cases {
            assert_eq!(status_for(&err).as_u16(), code, "{err:?}");
        }
    }

    #[test]
    fn test_vendor_detail_embeds_message() {
        let api: ApiError = GiftGenError::vendor("Music generation failed", "quota exceeded").into();
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.detail, "Music generation failed: quota exceeded");
    }
}
