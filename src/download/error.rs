//! Error types for the download module.
//!
//! This module defines structured errors for asset downloads, providing
//! context-rich error messages for debugging and failure notices.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while fetching an asset.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The server asked us to slow down (HTTP 429).
    #[error("rate limited downloading {url}, retry after {}s", retry_after.as_secs())]
    RateLimited {
        /// The URL that was rate limited.
        url: String,
        /// How long the server asked us to wait.
        retry_after: Duration,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during download (create file, write, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a rate-limit error carrying the requested wait.
    pub fn rate_limited(url: impl Into<String>, retry_after: Duration) -> Self {
        Self::RateLimited {
            url: url.into(),
            retry_after,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_http_status_display() {
        let err = DownloadError::http_status("https://example.com/file.mp4", 404);
        let msg = err.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("example.com"), "Expected URL in: {msg}");
    }

    #[test]
    fn test_download_error_rate_limited_display() {
        let err =
            DownloadError::rate_limited("https://example.com/file.mp4", Duration::from_secs(7));
        assert_eq!(
            err.to_string(),
            "rate limited downloading https://example.com/file.mp4, retry after 7s"
        );
    }

    #[test]
    fn test_download_error_timeout_display() {
        let err = DownloadError::timeout("https://slow.example.com/file");
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_download_error_io_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = DownloadError::io("/tmp/work/a.mp4", io_err);
        let msg = err.to_string();
        assert!(msg.contains("/tmp/work/a.mp4"), "Expected path in: {msg}");
        assert!(msg.contains("access denied"), "Expected cause in: {msg}");
    }

    #[test]
    fn test_download_error_invalid_url_display() {
        let err = DownloadError::invalid_url("not-a-url");
        assert_eq!(err.to_string(), "invalid URL: not-a-url");
    }
}
