//! Remote fetch streamed straight to disk.

use std::path::Path;

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

/// Streams `url` into `dest`, returning the number of bytes written.
///
/// Any failure removes whatever was written to `dest` before the error is
/// returned. Success resolves only after the file is flushed, synced and closed.
pub async fn download_to_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<u64> {
    match transfer(client, url, dest).await {
        Ok(written) => {
            tracing::info!(url, dest = %dest.display(), bytes = written, "download complete");
            Ok(written)
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(dest).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(dest = %dest.display(), error = %cleanup, "failed to remove partial download");
                }
            }
            tracing::warn!(url, dest = %dest.display(), error = %e, "download failed");
            Err(e)
        }
    }
}

async fn transfer(client: &reqwest::Client, url: &str, dest: &Path) -> Result<u64> {
    let failure = |source: reqwest::Error| Error::TransportFailure {
        url: url.to_string(),
        source,
    };

    let mut file = fs::File::create(dest).await.map_err(|e| Error::io(dest, e))?;

    let mut response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(failure)?;

    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await.map_err(failure)? {
        file.write_all(&chunk).await.map_err(|e| Error::io(dest, e))?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(|e| Error::io(dest, e))?;
    file.sync_all().await.map_err(|e| Error::io(dest, e))?;
    drop(file);

    Ok(written)
}
