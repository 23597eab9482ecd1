//! fal queue API (video jobs) and fal storage (uploads).
//!
//! Queue protocol: `POST {queue}/{model}` returns a request id plus status and
//! response URLs; the status URL reports `IN_QUEUE` / `IN_PROGRESS` /
//! `COMPLETED`; the response URL yields the result descriptor.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use giftgen_core::error::{GiftGenError, Result};

use crate::{JobTicket, MediaUploader, VendorStatus, VideoJobSpec, VideoProvider, check_status};

const FAL_QUEUE_BASE_URL: &str = "https://queue.fal.run";
const FAL_STORAGE_BASE_URL: &str = "https://rest.alpha.fal.ai";

/// Upper bound for any single queue or storage request.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

pub struct FalClient {
    pub queue_base_url: String,
    pub storage_base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    request_id: String,
    #[serde(default)]
    status_url: Option<String>,
    #[serde(default)]
    response_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    queue_position: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InitiateUploadResponse {
    upload_url: String,
    file_url: String,
}

impl FalClient {
    pub fn new(
        api_key: String,
        queue_base_url: Option<&str>,
        storage_base_url: Option<&str>,
        model: String,
    ) -> Self {
        Self {
            queue_base_url: queue_base_url
                .unwrap_or(FAL_QUEUE_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            storage_base_url: storage_base_url
                .unwrap_or(FAL_STORAGE_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: model.trim_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.api_key)
    }

    /// Request paths are keyed by the app id: the first two segments of the model.
    fn app_id(&self) -> String {
        self.model.split('/').take(2).collect::<Vec<_>>().join("/")
    }

    fn ticket_from(&self, submitted: SubmitResponse) -> JobTicket {
        let base = format!(
            "{}/{}/requests/{}",
            self.queue_base_url,
            self.app_id(),
            submitted.request_id
        );
        JobTicket {
            status_url: submitted
                .status_url
                .unwrap_or_else(|| format!("{base}/status")),
            response_url: submitted.response_url.unwrap_or(base),
            request_id: submitted.request_id,
        }
    }

    fn job_input(spec: &VideoJobSpec) -> serde_json::Value {
        json!({
            "image_url": spec.image_url,
            "audio_url": spec.audio_url,
            "prompt": spec.prompt,
            "resolution": spec.resolution.as_str(),
        })
    }
}

#[async_trait]
impl VideoProvider for FalClient {
    fn id(&self) -> &str {
        "fal"
    }

    async fn submit(&self, spec: &VideoJobSpec) -> Result<JobTicket> {
        const CONTEXT: &str = "Video job submission failed";
        let url = format!("{}/{}", self.queue_base_url, self.model);
        debug!(%url, resolution = spec.resolution.as_str(), "Submitting video job");

        let response = self
            .client
            .post(&url)
            .header("authorization", self.auth_header())
            .json(&Self::job_input(spec))
            .send()
            .await
            .map_err(|e| GiftGenError::vendor(CONTEXT, e))?;
        let submitted: SubmitResponse = check_status(response, CONTEXT)
            .await?
            .json()
            .await
            .map_err(|e| GiftGenError::vendor(CONTEXT, e))?;

        let ticket = self.ticket_from(submitted);
        info!(request_id = %ticket.request_id, model = %self.model, "Video job submitted");
        Ok(ticket)
    }

    async fn status(&self, ticket: &JobTicket) -> Result<VendorStatus> {
        const CONTEXT: &str = "Video status check failed";
        let response = self
            .client
            .get(&ticket.status_url)
            .header("authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| GiftGenError::vendor(CONTEXT, e))?;
        let status: StatusResponse = check_status(response, CONTEXT)
            .await?
            .json()
            .await
            .map_err(|e| GiftGenError::vendor(CONTEXT, e))?;

        VendorStatus::parse(&status.status, status.queue_position, status.error.as_deref())
    }

    async fn result(&self, ticket: &JobTicket) -> Result<serde_json::Value> {
        const CONTEXT: &str = "Video result fetch failed";
        let response = self
            .client
            .get(&ticket.response_url)
            .header("authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| GiftGenError::vendor(CONTEXT, e))?;
        check_status(response, CONTEXT)
            .await?
            .json()
            .await
            .map_err(|e| GiftGenError::vendor(CONTEXT, e))
    }
}

#[async_trait]
impl MediaUploader for FalClient {
    async fn upload(&self, bytes: Vec<u8>, file_name: &str, content_type: &str) -> Result<String> {
        const CONTEXT: &str = "Upload to vendor storage failed";
        let size = bytes.len();

        let response = self
            .client
            .post(format!(
                "{}/storage/upload/initiate?storage_type=fal-cdn-v3",
                self.storage_base_url
            ))
            .header("authorization", self.auth_header())
            .json(&json!({"content_type": content_type, "file_name": file_name}))
            .send()
            .await
            .map_err(|e| GiftGenError::vendor(CONTEXT, e))?;
        let target: InitiateUploadResponse = check_status(response, CONTEXT)
            .await?
            .json()
            .await
            .map_err(|e| GiftGenError::vendor(CONTEXT, e))?;

        let response = self
            .client
            .put(&target.upload_url)
            .header("content-type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| GiftGenError::vendor(CONTEXT, e))?;
        check_status(response, CONTEXT).await?;

        info!(file_name, size, url = %target.file_url, "Uploaded to vendor storage");
        Ok(target.file_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use giftgen_core::types::Resolution;

    fn client() -> FalClient {
        FalClient::new("fk".into(), None, None, "fal-ai/ai-avatar/single-text".into())
    }

    #[test]
    fn test_app_id_is_two_segments() {
        assert_eq!(client().app_id(), "fal-ai/ai-avatar");
    }

    #[test]
    fn test_ticket_falls_back_to_derived_urls() {
        let ticket = client().ticket_from(SubmitResponse {
            request_id: "req-1".into(),
            status_url: None,
            response_url: None,
        });
        assert_eq!(
            ticket.status_url,
            "https://queue.fal.run/fal-ai/ai-avatar/requests/req-1/status"
        );
        assert_eq!(
            ticket.response_url,
            "https://queue.fal.run/fal-ai/ai-avatar/requests/req-1"
        );
    }

    #[test]
    fn test_ticket_prefers_vendor_urls() {
        let ticket = client().ticket_from(SubmitResponse {
            request_id: "req-2".into(),
            status_url: Some("https://q/s".into()),
            response_url: Some("https://q/r".into()),
        });
        assert_eq!(ticket.status_url, "https://q/s");
        assert_eq!(ticket.response_url, "https://q/r");
    }

    #[test]
    fn test_job_input() {
        let input = FalClient::job_input(&VideoJobSpec {
            image_url: "https://img".into(),
            audio_url: "https://aud".into(),
            prompt: "singing".into(),
            resolution: Resolution::P720,
        });
        assert_eq!(input["resolution"], "720p");
        assert_eq!(input["audio_url"], "https://aud");
    }
}
