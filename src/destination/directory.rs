//! A chat platform mirrored on the local file system.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<destination id>/
//!     .handle          public handle (optional)
//!     .forum           present when the container is threaded
//!     .readonly        present when posting is not allowed
//!     messages.jsonl   one JSON record per posted message
//!     files/           uploads without a thread
//!     threads/<id>/    uploads inside sub-thread <id>
//! ```
//!
//! Message ids are sequential per container; sub-thread ids share that
//! sequence because creating a thread posts a service message.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::{
    Destination, DestinationId, MessageId, MessageRef, PlatformError, ThreadId, UploadRequest,
};

const HANDLE_FILE: &str = ".handle";
const FORUM_MARKER: &str = ".forum";
const READONLY_MARKER: &str = ".readonly";
const MESSAGES_FILE: &str = "messages.jsonl";

/// What a stored message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// An uploaded asset with caption.
    Upload,
    /// A plain text notice.
    Notice,
    /// Service message recording a sub-thread's creation.
    ThreadCreated,
}

/// One line of `messages.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Sequential message id.
    pub id: i64,
    /// Kind of post.
    pub kind: MessageKind,
    /// Sub-thread the message was posted in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<i64>,
    /// Caption, notice text or thread title.
    pub text: String,
    /// Stored asset path relative to the container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Requested rendition for uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    /// Watermark label for uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,
    /// Credit line for uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit: Option<String>,
}

impl StoredMessage {
    fn new(kind: MessageKind, thread: Option<ThreadId>, text: &str) -> Self {
        Self {
            id: 0,
            kind,
            thread: thread.map(|t| t.0),
            text: text.to_string(),
            file: None,
            resolution: None,
            watermark: None,
            credit: None,
        }
    }
}

/// [`Destination`] backed by a directory tree.
#[derive(Debug)]
pub struct DirectoryDestination {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl DirectoryDestination {
    /// Creates a destination rooted at `root`. Nothing is created on disk.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Root directory of the mirror.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a destination container.
    #[must_use]
    pub fn container_dir(&self, destination: DestinationId) -> PathBuf {
        self.root.join(destination.to_string())
    }

    /// Creates the container directory for `destination` if it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Io`] if the directory cannot be created.
    pub async fn ensure_container(&self, destination: DestinationId) -> Result<(), PlatformError> {
        let dir = self.container_dir(destination);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PlatformError::io(dir, e))
    }

    /// Reads every message posted to `destination`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Io`] when the log cannot be read and
    /// [`PlatformError::Corrupt`] for a malformed line.
    pub async fn read_messages(
        &self,
        destination: DestinationId,
    ) -> Result<Vec<StoredMessage>, PlatformError> {
        let path = self.container_dir(destination).join(MESSAGES_FILE);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PlatformError::io(path, e)),
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|source| PlatformError::Corrupt {
                    path: path.clone(),
                    source,
                })
            })
            .collect()
    }

    async fn existing_container(&self, destination: DestinationId) -> Result<PathBuf, PlatformError> {
        let dir = self.container_dir(destination);
        if tokio::fs::metadata(&dir).await.is_ok_and(|m| m.is_dir()) {
            Ok(dir)
        } else {
            Err(PlatformError::not_found(format!("destination {destination}")))
        }
    }

    async fn writable_container(&self, destination: DestinationId) -> Result<PathBuf, PlatformError> {
        let dir = self.existing_container(destination).await?;
        if marker_exists(&dir, READONLY_MARKER).await {
            return Err(PlatformError::permission_denied(destination));
        }
        Ok(dir)
    }

    /// Appends `message` with the next sequential id and returns that id.
    async fn append_message(
        &self,
        container: &Path,
        mut message: StoredMessage,
    ) -> Result<MessageId, PlatformError> {
        let path = container.join(MESSAGES_FILE);
        let existing = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents.lines().filter(|l| !l.trim().is_empty()).count(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(PlatformError::io(path, e)),
        };
        message.id = i64::try_from(existing).unwrap_or(i64::MAX - 1) + 1;

        let mut line = serde_json::to_string(&message).map_err(|source| PlatformError::Corrupt {
            path: path.clone(),
            source,
        })?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| PlatformError::io(path.clone(), e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| PlatformError::io(path.clone(), e))?;
        file.flush()
            .await
            .map_err(|e| PlatformError::io(path.clone(), e))?;

        debug!(id = message.id, kind = ?message.kind, "recorded message");
        Ok(MessageId(message.id))
    }
}

async fn marker_exists(dir: &Path, marker: &str) -> bool {
    tokio::fs::metadata(dir.join(marker)).await.is_ok()
}

/// Picks a free file name in `dir` for `name`.
fn unique_target(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos..]),
        _ => (name, ""),
    };
    (1..)
        .map(|i| dir.join(format!("{stem}_{i}{ext}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[async_trait]
impl Destination for DirectoryDestination {
    #[instrument(skip(self))]
    async fn resolve_handle(&self, handle: &str) -> Result<DestinationId, PlatformError> {
        let wanted = handle.trim().trim_start_matches('@');
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| PlatformError::io(self.root.clone(), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PlatformError::io(self.root.clone(), e))?
        {
            let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<i64>().ok())
            else {
                continue;
            };
            let Ok(stored) = tokio::fs::read_to_string(entry.path().join(HANDLE_FILE)).await else {
                continue;
            };
            if stored.trim().eq_ignore_ascii_case(wanted) {
                return Ok(DestinationId(id));
            }
        }

        Err(PlatformError::not_found(format!("handle @{wanted}")))
    }

    async fn is_threaded(&self, destination: DestinationId) -> Result<bool, PlatformError> {
        let dir = self.existing_container(destination).await?;
        Ok(marker_exists(&dir, FORUM_MARKER).await)
    }

    async fn public_handle(
        &self,
        destination: DestinationId,
    ) -> Result<Option<String>, PlatformError> {
        let dir = self.existing_container(destination).await?;
        match tokio::fs::read_to_string(dir.join(HANDLE_FILE)).await {
            Ok(handle) => {
                let handle = handle.trim().trim_start_matches('@').to_string();
                Ok((!handle.is_empty()).then_some(handle))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PlatformError::io(dir.join(HANDLE_FILE), e)),
        }
    }

    async fn can_post(&self, destination: DestinationId) -> Result<bool, PlatformError> {
        let dir = self.existing_container(destination).await?;
        Ok(!marker_exists(&dir, READONLY_MARKER).await)
    }

    #[instrument(skip(self), fields(destination = %destination))]
    async fn create_sub_thread(
        &self,
        destination: DestinationId,
        title: &str,
    ) -> Result<ThreadId, PlatformError> {
        let _guard = self.write_lock.lock().await;
        let dir = self.writable_container(destination).await?;
        if !marker_exists(&dir, FORUM_MARKER).await {
            return Err(PlatformError::transport(format!(
                "destination {destination} does not support sub-threads"
            )));
        }

        let id = self
            .append_message(&dir, StoredMessage::new(MessageKind::ThreadCreated, None, title))
            .await?;
        let thread_dir = dir.join("threads").join(id.to_string());
        tokio::fs::create_dir_all(&thread_dir)
            .await
            .map_err(|e| PlatformError::io(thread_dir.clone(), e))?;
        Ok(ThreadId(id.0))
    }

    #[instrument(skip(self, request), fields(destination = %request.destination, asset = %request.asset.display()))]
    async fn upload(&self, request: &UploadRequest) -> Result<Option<MessageRef>, PlatformError> {
        let _guard = self.write_lock.lock().await;
        let dir = self.writable_container(request.destination).await?;

        let folder = match request.thread {
            Some(thread) => {
                let folder = dir.join("threads").join(thread.to_string());
                if !folder.is_dir() {
                    return Err(PlatformError::not_found(format!("thread {thread}")));
                }
                folder
            }
            None => dir.join("files"),
        };
        tokio::fs::create_dir_all(&folder)
            .await
            .map_err(|e| PlatformError::io(folder.clone(), e))?;

        let file_name = request
            .asset
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("asset.bin");
        let target = unique_target(&folder, file_name);
        tokio::fs::copy(&request.asset, &target)
            .await
            .map_err(|e| PlatformError::io(request.asset.clone(), e))?;

        let relative = target
            .strip_prefix(&dir)
            .unwrap_or(&target)
            .to_string_lossy()
            .replace('\\', "/");
        let mut message = StoredMessage::new(MessageKind::Upload, request.thread, &request.caption);
        message.file = Some(relative);
        message.resolution = Some(request.resolution.clone());
        message.watermark = Some(request.watermark.clone());
        message.credit = Some(request.credit.clone());

        let id = self.append_message(&dir, message).await?;
        Ok(Some(MessageRef::new(request.destination, id)))
    }

    #[instrument(skip(self, text), fields(destination = %destination))]
    async fn send_notice(
        &self,
        destination: DestinationId,
        text: &str,
        thread: Option<ThreadId>,
    ) -> Result<MessageRef, PlatformError> {
        let _guard = self.write_lock.lock().await;
        let dir = self.writable_container(destination).await?;
        let id = self
            .append_message(&dir, StoredMessage::new(MessageKind::Notice, thread, text))
            .await?;
        Ok(MessageRef::new(destination, id))
    }
}
