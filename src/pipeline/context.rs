//! Run-scoped state.

use crate::destination::ForumTopicResolver;
use crate::index::TopicIndexStore;
use crate::params::RunParameters;
use crate::report::RunCounts;

/// Everything one run mutates, owned by that run alone.
#[derive(Debug)]
pub struct RunContext {
    /// Final parameters.
    pub params: RunParameters,
    /// Topic to sub-thread cache.
    pub threads: ForumTopicResolver,
    /// Accumulated index and its sinks.
    pub store: TopicIndexStore,
    /// Progress counters.
    pub counts: RunCounts,
    /// Rate-limit retries performed so far.
    pub rate_limit_retries: u32,
}

impl RunContext {
    /// Creates the context for `total` scheduled entries.
    #[must_use]
    pub fn new(
        params: RunParameters,
        threads: ForumTopicResolver,
        store: TopicIndexStore,
        total: usize,
    ) -> Self {
        Self {
            params,
            threads,
            store,
            counts: RunCounts {
                total,
                ..RunCounts::default()
            },
            rate_limit_retries: 0,
        }
    }
}
