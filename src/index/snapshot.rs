//! JSON snapshot file sink.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use super::{IndexSink, PersistError, TopicIndex};
use crate::naming::snapshot_file_name;

/// Writes each batch's index to `<dir>/topic_index_<batch>.json`.
///
/// Every write goes to a temp file in the same directory and is renamed
/// over the target, so readers only ever see a complete snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotFileSink {
    dir: PathBuf,
}

impl SnapshotFileSink {
    /// Creates a sink writing into `dir` (created on first write).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path the snapshot of `batch_name` is written to.
    #[must_use]
    pub fn path_for(&self, batch_name: &str) -> PathBuf {
        self.dir.join(snapshot_file_name(batch_name))
    }

    /// Reads a batch's snapshot back.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Io`] if the file cannot be read and
    /// [`PersistError::Serialize`] if it is not a topic index.
    pub async fn load(&self, batch_name: &str) -> Result<TopicIndex, PersistError> {
        let path = self.path_for(batch_name);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PersistError::io(path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }
}

fn write_atomically(dir: &Path, target: &Path, content: &str) -> Result<(), PersistError> {
    std::fs::create_dir_all(dir).map_err(|e| PersistError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PersistError::io(dir, e))?;
    let tmp_path = tmp.path().to_path_buf();
    let tmp_err = |e: std::io::Error| PersistError::io(&tmp_path, e);
    tmp.write_all(content.as_bytes()).map_err(tmp_err)?;
    tmp.flush().map_err(tmp_err)?;
    tmp.as_file_mut().sync_all().map_err(tmp_err)?;

    tmp.persist(target)
        .map_err(|e| PersistError::io(target, e.error))?;
    Ok(())
}

#[async_trait]
impl IndexSink for SnapshotFileSink {
    fn name(&self) -> &'static str {
        "snapshot-file"
    }

    #[instrument(skip(self, index), fields(entries = index.entry_count()))]
    async fn persist(&self, batch_name: &str, index: &TopicIndex) -> Result<(), PersistError> {
        let content = index.to_pretty_json()?;
        let dir = self.dir.clone();
        let target = self.path_for(batch_name);

        let written = target.clone();
        tokio::task::spawn_blocking(move || write_atomically(&dir, &target, &content)).await??;

        debug!(path = %written.display(), "wrote topic index snapshot");
        Ok(())
    }
}
