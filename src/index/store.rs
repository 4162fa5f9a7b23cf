//! In-memory topic index with write-through persistence.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::{IndexSink, TopicIndex, TopicIndexEntry};

/// Accumulates a run's topic index and persists it after every append.
///
/// The in-memory index is authoritative: sink failures are logged and
/// counted, never propagated.
pub struct TopicIndexStore {
    batch_name: String,
    index: TopicIndex,
    sinks: Vec<Arc<dyn IndexSink>>,
    persistence_failures: usize,
}

impl std::fmt::Debug for TopicIndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicIndexStore")
            .field("batch_name", &self.batch_name)
            .field("entries", &self.index.entry_count())
            .field(
                "sinks",
                &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("persistence_failures", &self.persistence_failures)
            .finish()
    }
}

impl TopicIndexStore {
    /// Creates an empty store for `batch_name` writing to `sinks`.
    pub fn new(batch_name: impl Into<String>, sinks: Vec<Arc<dyn IndexSink>>) -> Self {
        Self {
            batch_name: batch_name.into(),
            index: TopicIndex::new(),
            sinks,
            persistence_failures: 0,
        }
    }

    /// Batch the index belongs to.
    #[must_use]
    pub fn batch_name(&self) -> &str {
        &self.batch_name
    }

    /// Appends `entry` under `topic`, then writes the full index to every sink.
    ///
    /// Returns how many sinks failed to persist this snapshot.
    #[instrument(skip(self, entry), fields(batch = %self.batch_name))]
    pub async fn append(&mut self, topic: &str, entry: TopicIndexEntry) -> usize {
        self.index.push(topic, entry);

        let mut failed = 0;
        for sink in &self.sinks {
            match sink.persist(&self.batch_name, &self.index).await {
                Ok(()) => debug!(sink = sink.name(), "persisted topic index"),
                Err(error) => {
                    failed += 1;
                    warn!(sink = sink.name(), error = %error, "failed to persist topic index");
                }
            }
        }
        self.persistence_failures += failed;
        failed
    }

    /// Copy of the index as accumulated so far.
    #[must_use]
    pub fn snapshot(&self) -> TopicIndex {
        self.index.clone()
    }

    /// Borrow of the index as accumulated so far.
    #[must_use]
    pub fn index(&self) -> &TopicIndex {
        &self.index
    }

    /// Total sink write failures over the run.
    #[must_use]
    pub fn persistence_failures(&self) -> usize {
        self.persistence_failures
    }

    /// Consumes the store, returning the final index.
    #[must_use]
    pub fn into_index(self) -> TopicIndex {
        self.index
    }
}
