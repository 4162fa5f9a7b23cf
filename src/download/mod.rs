//! Asset download collaborator.
//!
//! The pipeline fetches every manifest entry through the [`AssetDownloader`]
//! trait; [`HttpDownloader`] is the streaming HTTP implementation used by the
//! binary.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - Extension detection from URL, Content-Disposition or Content-Type
//! - HTTP 429 mapped to [`DownloadError::RateLimited`] with the Retry-After wait
//! - Partial files removed on failure

mod client;
mod constants;
mod error;
mod filename;
mod retry_after;

use std::path::PathBuf;

use async_trait::async_trait;

pub use client::HttpDownloader;
pub use constants::{CONNECT_TIMEOUT_SECS, DEFAULT_RETRY_AFTER, MAX_RETRY_AFTER, READ_TIMEOUT_SECS};
pub use error::DownloadError;
pub use retry_after::parse_retry_after;

/// Fetches an asset to local storage.
///
/// `base_name` is an already sanitised file stem; implementations pick the
/// extension.
#[async_trait]
pub trait AssetDownloader: Send + Sync {
    /// Downloads `url` and returns the local path of the asset.
    ///
    /// # Errors
    ///
    /// [`DownloadError::RateLimited`] when the source asks the caller to
    /// wait; any other variant for failures that end the item.
    async fn download(&self, url: &str, base_name: &str) -> Result<PathBuf, DownloadError>;
}
