//! Direct archive upload to a pre-signed URL

use std::path::Path;
use std::sync::Arc;

use reqwest::{header, Body, Client};
use tracing::{debug, info};

use crate::errors::CliError;
use crate::http::client::check_status;
use crate::upload::{counting_stream, UploadProgress};

/// PUT `archive` to `upload_url`, streaming it from disk
pub async fn put_archive(
    client: &Client,
    upload_url: &str,
    archive: &Path,
    progress: Arc<UploadProgress>,
) -> Result<(), CliError> {
    let file = tokio::fs::File::open(archive).await.map_err(|e| {
        CliError::FileSystem(format!("failed to open archive {}: {e}", archive.display()))
    })?;
    let size = file.metadata().await?.len();
    debug!("PUT {} bytes to upload URL", size);

    let response = client
        .put(upload_url)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_LENGTH, size)
        .body(Body::wrap_stream(counting_stream(file, progress)))
        .send()
        .await
        .map_err(|e| CliError::api(format!("failed to upload archive: {e}")))?;
    check_status("PUT", response).await?;

    info!("uploaded archive ({} bytes)", size);
    Ok(())
}
