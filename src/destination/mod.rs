//! Destination platform seam.
//!
//! Everything the pipeline needs from the messaging platform goes through
//! the [`Destination`] trait: handle lookup, thread support, posting uploads
//! and notices. [`DirectoryDestination`] mirrors a chat platform on the
//! local file system.
//!
//! Helpers built on the trait:
//! - [`resolve_destination`] - free-text reference to a destination id
//! - [`ForumTopicResolver`] - topic label to sub-thread, created once per run
//! - [`permalink_for`] - stable link to a posted message

mod directory;
mod error;
mod permalink;
mod reference;
mod threads;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use directory::{DirectoryDestination, MessageKind, StoredMessage};
pub use error::PlatformError;
pub use permalink::{build_permalink, permalink_for};
pub use reference::{DestinationReference, resolve_destination};
pub use threads::{FALLBACK_THREAD_TITLE, ForumTopicResolver, MAX_THREAD_TITLE_CHARS, thread_title};

/// Canonical id of a chat, group or channel.
///
/// Ids of supergroups and channels carry the `-100` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationId(pub i64);

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Id of a sub-thread (forum topic) within a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub i64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Id of a message within a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of a posted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    /// Where the message lives.
    pub destination: DestinationId,
    /// The message's id within that destination.
    pub message_id: MessageId,
}

impl MessageRef {
    /// Creates a message reference.
    #[must_use]
    pub fn new(destination: DestinationId, message_id: MessageId) -> Self {
        Self {
            destination,
            message_id,
        }
    }
}

/// Everything needed to post one downloaded asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Local file to post.
    pub asset: PathBuf,
    /// HTML caption.
    pub caption: String,
    /// Requested rendition, e.g. `480`.
    pub resolution: String,
    /// Watermark label.
    pub watermark: String,
    /// Credit line.
    pub credit: String,
    /// Target destination.
    pub destination: DestinationId,
    /// Target sub-thread, if any.
    pub thread: Option<ThreadId>,
}

/// A messaging platform the pipeline can post to.
///
/// Implementations must be shareable across tasks; the pipeline holds them
/// as `Arc<dyn Destination>`.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Resolves a public handle (without `@`) to a destination id.
    async fn resolve_handle(&self, handle: &str) -> Result<DestinationId, PlatformError>;

    /// Whether the destination supports sub-threads.
    async fn is_threaded(&self, destination: DestinationId) -> Result<bool, PlatformError>;

    /// Public handle of the destination, if it has one.
    async fn public_handle(
        &self,
        destination: DestinationId,
    ) -> Result<Option<String>, PlatformError>;

    /// Whether we are allowed to post in the destination.
    async fn can_post(&self, destination: DestinationId) -> Result<bool, PlatformError>;

    /// Creates a sub-thread titled `title`.
    async fn create_sub_thread(
        &self,
        destination: DestinationId,
        title: &str,
    ) -> Result<ThreadId, PlatformError>;

    /// Posts an asset.
    ///
    /// `Ok(None)` means the platform accepted the post but returned no
    /// addressable message.
    async fn upload(&self, request: &UploadRequest) -> Result<Option<MessageRef>, PlatformError>;

    /// Posts a plain HTML text message.
    async fn send_notice(
        &self,
        destination: DestinationId,
        text: &str,
        thread: Option<ThreadId>,
    ) -> Result<MessageRef, PlatformError>;
}
