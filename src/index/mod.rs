//! Topic index: the run's mapping from topic label to uploaded items.
//!
//! [`TopicIndex`] keeps topics in first-seen order and entries in append
//! order. [`TopicIndexStore`] accumulates it during a run and rewrites the
//! full snapshot to every [`IndexSink`] after each append.
//!
//! Sinks:
//! - [`SnapshotFileSink`] - pretty JSON file per batch
//! - [`SqliteIndexSink`] - durable row per batch in SQLite

mod error;
mod snapshot;
mod sqlite;
mod store;

use std::fmt;

use async_trait::async_trait;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use error::PersistError;
pub use snapshot::SnapshotFileSink;
pub use sqlite::SqliteIndexSink;
pub use store::TopicIndexStore;

/// One uploaded item in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicIndexEntry {
    /// `"<topic> | <sanitised name>"`.
    pub title: String,
    /// Permalink of the uploaded message.
    pub link: String,
}

impl TopicIndexEntry {
    /// Creates an index entry.
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
        }
    }
}

/// Entries of one topic, in append order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSection {
    /// Topic label.
    pub topic: String,
    /// Entries under the topic.
    pub entries: Vec<TopicIndexEntry>,
}

/// Ordered mapping from topic label to entries.
///
/// Serialises as a JSON object whose keys appear in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicIndex {
    sections: Vec<TopicSection>,
}

impl TopicIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry` under `topic`, adding the topic at the end if new.
    pub fn push(&mut self, topic: &str, entry: TopicIndexEntry) {
        match self.sections.iter_mut().find(|s| s.topic == topic) {
            Some(section) => section.entries.push(entry),
            None => self.sections.push(TopicSection {
                topic: topic.to_string(),
                entries: vec![entry],
            }),
        }
    }

    /// Topic sections in first-seen order.
    #[must_use]
    pub fn sections(&self) -> &[TopicSection] {
        &self.sections
    }

    /// Entries recorded under `topic`.
    #[must_use]
    pub fn entries(&self, topic: &str) -> Option<&[TopicIndexEntry]> {
        self.sections
            .iter()
            .find(|s| s.topic == topic)
            .map(|s| s.entries.as_slice())
    }

    /// Number of topics.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.sections.len()
    }

    /// Number of entries across all topics.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.sections.iter().map(|s| s.entries.len()).sum()
    }

    /// Whether no entry has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Renders the index as 2-space indented JSON with non-ASCII kept.
    ///
    /// # Errors
    ///
    /// Propagates serialisation failures from `serde_json`.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for TopicIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for section in &self.sections {
            map.serialize_entry(&section.topic, &section.entries)?;
        }
        map.end()
    }
}

struct TopicIndexVisitor;

impl<'de> Visitor<'de> for TopicIndexVisitor {
    type Value = TopicIndex;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a map from topic label to a list of index entries")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut index = TopicIndex::new();
        while let Some((topic, entries)) = access.next_entry::<String, Vec<TopicIndexEntry>>()? {
            for entry in entries {
                index.push(&topic, entry);
            }
        }
        Ok(index)
    }
}

impl<'de> Deserialize<'de> for TopicIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TopicIndexVisitor)
    }
}

/// A place the full topic index snapshot is written to.
#[async_trait]
pub trait IndexSink: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Replaces the stored index of `batch_name` with `index`.
    async fn persist(&self, batch_name: &str, index: &TopicIndex) -> Result<(), PersistError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> TopicIndex {
        let mut index = TopicIndex::new();
        index.push("Optics", TopicIndexEntry::new("Optics | Lens", "https://t.me/c/1/2"));
        index.push("Mechanics", TopicIndexEntry::new("Mechanics | Laws", "https://t.me/c/1/3"));
        index.push("Optics", TopicIndexEntry::new("Optics | Prism", "https://t.me/c/1/4"));
        index
    }

    #[test]
    fn test_push_groups_by_topic_in_first_seen_order() {
        let index = sample();
        let topics: Vec<&str> = index.sections().iter().map(|s| s.topic.as_str()).collect();
        assert_eq!(topics, vec!["Optics", "Mechanics"]);
        assert_eq!(index.entries("Optics").unwrap().len(), 2);
        assert_eq!(index.entry_count(), 3);
        assert_eq!(index.topic_count(), 2);
    }

    #[test]
    fn test_json_keeps_topic_order_and_unicode() {
        let mut index = sample();
        index.push("ज्यामिति", TopicIndexEntry::new("ज्यामिति | त्रिभुज", "https://t.me/c/1/5"));

        let json = index.to_pretty_json().unwrap();
        let optics = json.find("\"Optics\"").unwrap();
        let mechanics = json.find("\"Mechanics\"").unwrap();
        assert!(optics < mechanics);
        assert!(json.contains("ज्यामिति"), "non-ASCII must not be escaped: {json}");
        assert!(json.contains("\n  \"Optics\": ["), "expected 2-space indent: {json}");
    }

    #[test]
    fn test_json_reads_back_identically() {
        let index = sample();
        let json = index.to_pretty_json().unwrap();
        let decoded: TopicIndex = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, index);
    }

    #[test]
    fn test_empty_index_serialises_to_empty_object() {
        assert_eq!(TopicIndex::new().to_pretty_json().unwrap(), "{}");
    }
}
