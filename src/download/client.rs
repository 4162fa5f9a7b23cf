//! Streaming HTTP implementation of [`AssetDownloader`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, RETRY_AFTER};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::AssetDownloader;
use super::constants::{CONNECT_TIMEOUT_SECS, DEFAULT_RETRY_AFTER, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use super::filename::{
    FALLBACK_EXTENSION, extension_from_content_type, extension_from_name, extension_from_url,
    parse_content_disposition, resolve_unique_path,
};
use super::retry_after::parse_retry_after;

fn default_user_agent() -> String {
    format!("uploader/{}", env!("CARGO_PKG_VERSION"))
}

/// Downloads assets over HTTP(S) into a work directory.
///
/// The client is created once per run and reused for every item, taking
/// advantage of connection pooling.
///
/// # Example
///
/// ```no_run
/// use uploader_core::download::{AssetDownloader, HttpDownloader};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let downloader = HttpDownloader::new("./work")?;
/// let path = downloader.download("https://example.com/a.mp4", "Lecture 1").await?;
/// println!("Downloaded to: {}", path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
    work_dir: PathBuf,
}

impl HttpDownloader {
    /// Creates a downloader with default timeouts (30s connect, 5min read).
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the HTTP client cannot be built.
    pub fn new(work_dir: impl Into<PathBuf>) -> Result<Self, DownloadError> {
        Self::with_timeouts(work_dir, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a downloader with explicit timeout values in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Client`] if the HTTP client cannot be built.
    pub fn with_timeouts(
        work_dir: impl Into<PathBuf>,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(default_user_agent())
            .build()
            .map_err(|source| DownloadError::Client { source })?;
        Ok(Self {
            client,
            work_dir: work_dir.into(),
        })
    }

    /// Directory downloaded assets are written to.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    async fn send_request(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after)
                .unwrap_or(DEFAULT_RETRY_AFTER);
            return Err(DownloadError::rate_limited(url, retry_after));
        }
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        Ok(response)
    }
}

#[async_trait]
impl AssetDownloader for HttpDownloader {
    #[instrument(skip(self), fields(url = %url))]
    async fn download(&self, url: &str, base_name: &str) -> Result<PathBuf, DownloadError> {
        debug!("starting download");

        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| DownloadError::io(self.work_dir.clone(), e))?;

        let response = self.send_request(url).await?;

        let extension = pick_extension(url, &response);
        let file_path = resolve_unique_path(&self.work_dir, &format!("{base_name}{extension}"));
        debug!(path = %file_path.display(), "resolved output path");

        let mut file = File::create(&file_path)
            .await
            .map_err(|e| DownloadError::io(file_path.clone(), e))?;

        let stream_result = stream_to_file(&mut file, response, url, &file_path).await;
        if stream_result.is_err() {
            debug!(path = %file_path.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(&file_path).await;
        }
        let bytes = stream_result?;

        info!(path = %file_path.display(), bytes, "download complete");
        Ok(file_path)
    }
}

/// Extension from the URL path, then Content-Disposition, then Content-Type.
fn pick_extension(url: &str, response: &reqwest::Response) -> String {
    if let Some(ext) = extension_from_url(url) {
        return ext;
    }

    let headers = response.headers();
    if let Some(ext) = headers
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_disposition)
        .and_then(|name| extension_from_name(&name))
    {
        return ext;
    }

    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(extension_from_content_type)
        .unwrap_or(FALLBACK_EXTENSION)
        .to_string()
}

/// Streams response body to file, returning bytes written.
///
/// This is extracted to enable cleanup on error in the caller.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_download_invalid_url_fails_before_network() {
        let temp_dir = tempfile::tempdir().unwrap();
        let downloader = HttpDownloader::new(temp_dir.path()).unwrap();

        let result = downloader.download("not-a-valid-url", "x").await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[test]
    fn test_default_user_agent_carries_version() {
        assert!(default_user_agent().starts_with("uploader/"));
    }
}
