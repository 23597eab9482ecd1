//! Streaming download of a remote file into an artifact.

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use giftgen_core::error::{GiftGenError, Result};

use crate::artifact_store::{Artifact, ArtifactStore};

/// Fetch `url` chunk by chunk into a new artifact of `store`.
///
/// Any transport, status or write failure removes the partial file and is
/// reported as [`GiftGenError::Download`].
pub async fn download_to_store(
    client: &reqwest::Client,
    url: &str,
    store: &ArtifactStore,
) -> Result<Artifact> {
    debug!(url, "Downloading artifact");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| GiftGenError::Download(format!("Failed to download video: {e}")))?;
    if !response.status().is_success() {
        let status = response.status();
        error!(url, %status, "Download rejected");
        return Err(GiftGenError::Download(format!(
            "Failed to download video: HTTP {status}"
        )));
    }

    let mut pending = store.create().await?;
    let mut body = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let outcome = match chunk {
            Ok(bytes) => pending.file.write_all(&bytes).await.map(|_| bytes.len()),
            Err(e) => Err(std::io::Error::other(e)),
        };
        match outcome {
            Ok(n) => written += n as u64,
            Err(e) => {
                error!(url, %e, written, "Download interrupted");
                pending.discard().await;
                return Err(GiftGenError::Download(format!(
                    "Failed to download video: {e}"
                )));
            }
        }
    }

    if written == 0 {
        pending.discard().await;
        return Err(GiftGenError::Download(
            "Failed to download video: empty response body".into(),
        ));
    }

    let artifact = pending.finish().await?;
    info!(filename = %artifact.filename, size = artifact.size_bytes, "Downloaded artifact");
    Ok(artifact)
}
