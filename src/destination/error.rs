//! Errors reported by destination platforms.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::DestinationId;

/// Failure of a destination-side operation.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The platform asked us to pause before trying again (flood wait).
    #[error("rate limited by destination, retry after {}s", retry_after.as_secs())]
    RateLimited {
        /// Wait requested by the platform.
        retry_after: Duration,
    },

    /// We may not post in the destination.
    #[error("not allowed to post in {destination}")]
    PermissionDenied {
        /// The destination that refused us.
        destination: DestinationId,
    },

    /// A chat, handle or thread does not exist.
    #[error("{what} not found")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// Any other transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Platform-provided description.
        message: String,
    },

    /// Local file system error while staging or recording a post.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A stored record could not be read back.
    #[error("malformed record in {path}: {source}")]
    Corrupt {
        /// File holding the bad record.
        path: PathBuf,
        /// The decode error.
        #[source]
        source: serde_json::Error,
    },
}

impl PlatformError {
    /// Creates a rate-limit error.
    #[must_use]
    pub fn rate_limited(retry_after: Duration) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Creates a permission error for `destination`.
    #[must_use]
    pub fn permission_denied(destination: DestinationId) -> Self {
        Self::PermissionDenied { destination }
    }

    /// Creates a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates a generic transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
