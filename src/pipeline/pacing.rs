//! Per-destination pacing between consecutive posts.
//!
//! Consecutive items to the same destination are separated by a minimum
//! gap. Different destinations never wait on each other, so one [`Pacer`]
//! can be shared by several runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::destination::DestinationId;

/// Default gap between items to the same destination.
pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_millis(500);

/// Warning threshold for cumulative waiting per destination (30 seconds).
const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Per-destination pacer.
///
/// Uses `DashMap` for concurrent access to per-destination state and a
/// `tokio::sync::Mutex` per destination for the read-update of its clock.
#[derive(Debug)]
pub struct Pacer {
    gap: Duration,
    destinations: DashMap<DestinationId, Arc<PaceState>>,
}

#[derive(Debug)]
struct PaceState {
    /// `None` until the first item; the first item never waits.
    last_item: Mutex<Option<Instant>>,
    cumulative_delay_ms: AtomicU64,
}

impl PaceState {
    fn new() -> Self {
        Self {
            last_item: Mutex::new(None),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(total)
    }
}

impl Pacer {
    /// Creates a pacer enforcing `gap` between items to one destination.
    #[must_use]
    pub fn new(gap: Duration) -> Self {
        Self {
            gap,
            destinations: DashMap::new(),
        }
    }

    /// Creates a pacer that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Configured gap.
    #[must_use]
    pub fn gap(&self) -> Duration {
        self.gap
    }

    fn state(&self, destination: DestinationId) -> Arc<PaceState> {
        // Clone the Arc so the shard lock is released before any await.
        self.destinations
            .entry(destination)
            .or_insert_with(|| Arc::new(PaceState::new()))
            .clone()
    }

    /// Waits until the next item to `destination` may start.
    #[instrument(skip(self), fields(destination = %destination))]
    pub async fn acquire(&self, destination: DestinationId) {
        if self.gap.is_zero() {
            return;
        }

        let state = self.state(destination);
        let mut last_item = state.last_item.lock().await;

        if let Some(last) = *last_item {
            let elapsed = last.elapsed();
            if elapsed < self.gap {
                let delay = self.gap.saturating_sub(elapsed);
                let cumulative = state.add_cumulative_delay(delay);
                debug!(
                    delay_ms = delay.as_millis(),
                    cumulative_ms = cumulative.as_millis(),
                    "pacing next item"
                );
                tokio::time::sleep(delay).await;
            }
        }

        *last_item = Some(Instant::now());
    }

    /// Records a wait imposed by the destination or a download source.
    #[instrument(skip(self), fields(destination = %destination))]
    pub fn record_rate_limit(&self, destination: DestinationId, delay: Duration) {
        let cumulative = self.state(destination).add_cumulative_delay(delay);
        debug!(
            delay_ms = delay.as_millis(),
            cumulative_ms = cumulative.as_millis(),
            "recorded rate limit"
        );
        if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
            warn!(
                cumulative_delay_secs = cumulative.as_secs(),
                "excessive rate limiting for destination"
            );
        }
    }

    /// Total time spent waiting for `destination` so far.
    #[must_use]
    pub fn cumulative_delay(&self, destination: DestinationId) -> Duration {
        self.destinations
            .get(&destination)
            .map_or(Duration::ZERO, |state| {
                Duration::from_millis(state.cumulative_delay_ms.load(Ordering::SeqCst))
            })
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(DEFAULT_ITEM_DELAY)
    }
}
