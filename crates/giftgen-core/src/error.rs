use thiserror::Error;

#[derive(Debug, Error)]
pub enum GiftGenError {
    /// A vendor credential is missing, so the capability is switched off.
    #[error("{0}")]
    NotConfigured(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{context}: {message}")]
    Vendor { context: String, message: String },

    /// The vendor answered successfully but returned nothing usable.
    #[error("{0}")]
    EmptyResult(String),

    #[error("Video generation failed: {0}")]
    JobFailed(String),

    #[error("Unrecognized vendor status: {0}")]
    UnrecognizedStatus(String),

    #[error("Video generation timed out after {elapsed_secs} seconds")]
    Timeout { elapsed_secs: u64 },

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Media error: {0}")]
    Media(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GiftGenError {
    pub fn vendor(context: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Vendor {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Short machine-readable label, used for log fields and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "not_configured",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Vendor { .. } => "vendor",
            Self::EmptyResult(_) => "empty_result",
            Self::JobFailed(_) => "job_failed",
            Self::UnrecognizedStatus(_) => "unrecognized_status",
            Self::Timeout { .. } => "timeout",
            Self::Download(_) => "download",
            Self::NotFound(_) => "not_found",
            Self::Cancelled => "cancelled",
            Self::Media(_) => "media",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, GiftGenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_message_embeds_context() {
        let err = GiftGenError::vendor("Lyrics generation failed", "401 Unauthorized");
        assert_eq!(err.to_string(), "Lyrics generation failed: 401 Unauthorized");
        assert_eq!(err.kind(), "vendor");
    }

    #[test]
    fn test_timeout_message() {
        let err = GiftGenError::Timeout { elapsed_secs: 300 };
        assert!(err.to_string().contains("300 seconds"));
    }
}
