//! Errors raised while persisting a topic index.

use std::path::PathBuf;

use thiserror::Error;

/// Failure writing or reading a topic index copy.
#[derive(Debug, Error)]
pub enum PersistError {
    /// File system error.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The index could not be encoded or decoded.
    #[error("failed to encode topic index: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The durable store rejected the operation.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The blocking writer task did not complete.
    #[error("snapshot writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PersistError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
