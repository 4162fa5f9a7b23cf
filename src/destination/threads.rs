//! Topic label to sub-thread mapping for threaded destinations.

use std::collections::HashMap;

use tracing::{debug, info, instrument, warn};

use super::{Destination, DestinationId, ThreadId};

/// Longest sub-thread title the platform accepts, in characters.
pub const MAX_THREAD_TITLE_CHARS: usize = 128;

/// Title tried once when creating a thread under the topic's own title fails.
pub const FALLBACK_THREAD_TITLE: &str = "Auto Index";

/// Title used for an empty topic label.
const EMPTY_TOPIC_TITLE: &str = "Topic";

/// Sub-thread title for a topic label.
#[must_use]
pub fn thread_title(topic: &str) -> String {
    let title: String = topic.chars().take(MAX_THREAD_TITLE_CHARS).collect();
    if title.trim().is_empty() {
        EMPTY_TOPIC_TITLE.to_string()
    } else {
        title
    }
}

/// Run-scoped map from topic label to sub-thread.
///
/// Each topic gets at most one creation attempt sequence per run (its own
/// title, then [`FALLBACK_THREAD_TITLE`]). The outcome, including "no
/// thread", is cached and never revisited.
#[derive(Debug)]
pub struct ForumTopicResolver {
    destination: DestinationId,
    threaded: bool,
    threads: HashMap<String, Option<ThreadId>>,
}

impl ForumTopicResolver {
    /// Creates a resolver with known thread support.
    #[must_use]
    pub fn new(destination: DestinationId, threaded: bool) -> Self {
        Self {
            destination,
            threaded,
            threads: HashMap::new(),
        }
    }

    /// Creates a resolver, asking the platform whether `destination` is
    /// threaded. A failed query counts as not threaded.
    #[instrument(skip(platform), fields(destination = %destination))]
    pub async fn for_destination(platform: &dyn Destination, destination: DestinationId) -> Self {
        let threaded = match platform.is_threaded(destination).await {
            Ok(threaded) => threaded,
            Err(error) => {
                warn!(error = %error, "could not query thread support, posting without threads");
                false
            }
        };
        debug!(threaded, "destination thread support");
        Self::new(destination, threaded)
    }

    /// Whether the destination supports sub-threads.
    #[must_use]
    pub fn is_threaded(&self) -> bool {
        self.threaded
    }

    /// Cached outcome for `topic`, if it was already resolved this run.
    #[must_use]
    pub fn cached(&self, topic: &str) -> Option<Option<ThreadId>> {
        self.threads.get(topic).copied()
    }

    /// Returns the sub-thread for `topic`, creating it on first use.
    #[instrument(skip(self, platform), fields(destination = %self.destination))]
    pub async fn resolve(&mut self, platform: &dyn Destination, topic: &str) -> Option<ThreadId> {
        if !self.threaded {
            return None;
        }
        if let Some(cached) = self.threads.get(topic) {
            return *cached;
        }

        let thread = self.create(platform, topic).await;
        self.threads.insert(topic.to_string(), thread);
        thread
    }

    async fn create(&self, platform: &dyn Destination, topic: &str) -> Option<ThreadId> {
        let title = thread_title(topic);
        match platform.create_sub_thread(self.destination, &title).await {
            Ok(thread) => {
                info!(topic, thread = %thread, "created sub-thread");
                return Some(thread);
            }
            Err(error) => {
                warn!(topic, error = %error, "sub-thread creation failed, trying fallback title");
            }
        }

        match platform
            .create_sub_thread(self.destination, FALLBACK_THREAD_TITLE)
            .await
        {
            Ok(thread) => {
                info!(topic, thread = %thread, "created fallback sub-thread");
                Some(thread)
            }
            Err(error) => {
                warn!(topic, error = %error, "fallback sub-thread creation failed, posting without thread");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_title_caps_length() {
        let long = "t".repeat(300);
        assert_eq!(thread_title(&long).chars().count(), MAX_THREAD_TITLE_CHARS);
    }

    #[test]
    fn test_thread_title_empty_topic() {
        assert_eq!(thread_title(""), "Topic");
        assert_eq!(thread_title("  "), "Topic");
    }

    #[test]
    fn test_thread_title_keeps_short_titles() {
        assert_eq!(thread_title("Mechanics"), "Mechanics");
    }
}
