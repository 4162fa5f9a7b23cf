//! Durable SQLite sink: one row per batch, replaced on every write.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{IndexSink, PersistError, TopicIndex};
use crate::db::Database;

/// Stores each batch's index in the `topic_indexes` table.
#[derive(Debug, Clone)]
pub struct SqliteIndexSink {
    db: Database,
}

impl SqliteIndexSink {
    /// Creates a sink over an open database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Loads the stored index of `batch_name`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Database`] on query failure and
    /// [`PersistError::Serialize`] when the stored document is malformed.
    #[instrument(skip(self))]
    pub async fn load_index(&self, batch_name: &str) -> Result<Option<TopicIndex>, PersistError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT index_json FROM topic_indexes WHERE batch_name = ?")
                .bind(batch_name)
                .fetch_optional(self.db.pool())
                .await?;

        row.map(|(json,)| serde_json::from_str(&json).map_err(PersistError::from))
            .transpose()
    }

    /// Batch names with a stored index, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Database`] on query failure.
    pub async fn batch_names(&self) -> Result<Vec<String>, PersistError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT batch_name FROM topic_indexes ORDER BY updated_at DESC, batch_name",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}

#[async_trait]
impl IndexSink for SqliteIndexSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    #[instrument(skip(self, index), fields(entries = index.entry_count()))]
    async fn persist(&self, batch_name: &str, index: &TopicIndex) -> Result<(), PersistError> {
        let json = serde_json::to_string(index)?;
        let topic_count = i64::try_from(index.topic_count()).unwrap_or(i64::MAX);
        let entry_count = i64::try_from(index.entry_count()).unwrap_or(i64::MAX);

        sqlx::query(
            r"INSERT INTO topic_indexes (batch_name, index_json, topic_count, entry_count)
              VALUES (?, ?, ?, ?)
              ON CONFLICT(batch_name) DO UPDATE SET
                  index_json = excluded.index_json,
                  topic_count = excluded.topic_count,
                  entry_count = excluded.entry_count,
                  updated_at = datetime('now')",
        )
        .bind(batch_name)
        .bind(json)
        .bind(topic_count)
        .bind(entry_count)
        .execute(self.db.pool())
        .await?;

        debug!("upserted topic index row");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::index::TopicIndexEntry;

    #[tokio::test]
    async fn test_persist_then_load() {
        let sink = SqliteIndexSink::new(Database::new_in_memory().await.unwrap());
        let mut index = TopicIndex::new();
        index.push("Optics", TopicIndexEntry::new("Optics | Lens", "https://t.me/c/1/2"));

        sink.persist("Physics", &index).await.unwrap();
        assert_eq!(sink.load_index("Physics").await.unwrap(), Some(index));
    }

    #[tokio::test]
    async fn test_persist_is_full_overwrite() {
        let sink = SqliteIndexSink::new(Database::new_in_memory().await.unwrap());
        let mut first = TopicIndex::new();
        first.push("A", TopicIndexEntry::new("A | 1", "l1"));
        sink.persist("batch", &first).await.unwrap();

        let mut second = TopicIndex::new();
        second.push("B", TopicIndexEntry::new("B | 1", "l2"));
        sink.persist("batch", &second).await.unwrap();

        assert_eq!(sink.load_index("batch").await.unwrap(), Some(second));
        assert_eq!(sink.batch_names().await.unwrap(), vec!["batch".to_string()]);
    }

    #[tokio::test]
    async fn test_load_missing_batch() {
        let sink = SqliteIndexSink::new(Database::new_in_memory().await.unwrap());
        assert_eq!(sink.load_index("nope").await.unwrap(), None);
    }
}
