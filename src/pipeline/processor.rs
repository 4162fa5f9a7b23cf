//! Per-item processing: download, upload, permalink, index.

use std::fmt;
use std::future::Future;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use super::caption::{build_caption, failure_notice, uploaded_notice};
use super::context::RunContext;
use super::outcome::{ClassifyFailure, FailureType, StepOutcome};
use super::pacing::Pacer;
use super::retry::{RetryDecision, RetryPolicy};
use crate::destination::{Destination, DestinationId, ThreadId, UploadRequest, permalink_for};
use crate::download::AssetDownloader;
use crate::index::TopicIndexEntry;
use crate::manifest::LinkEntry;
use crate::naming::{MAX_BASE_NAME_CHARS, sanitize_display_name};
use crate::topics::extract_topic;

/// Where an item is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// Not started.
    Pending,
    /// Fetching the asset.
    Downloading,
    /// Posting the asset.
    Uploading,
    /// Building the permalink.
    LinkBuilding,
    /// Uploaded and recorded in the index.
    Indexed,
    /// Given up on.
    Failed,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Uploading => "uploading",
            Self::LinkBuilding => "link-building",
            Self::Indexed => "indexed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How an item ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The item is in the index.
    Indexed {
        /// Topic it was filed under.
        topic: String,
        /// The recorded entry.
        entry: TopicIndexEntry,
    },
    /// The item failed; the run continues.
    Failed {
        /// Step that failed.
        step: ItemState,
        /// Error text.
        reason: String,
    },
}

impl ItemOutcome {
    /// Whether the item reached the index.
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        matches!(self, Self::Indexed { .. })
    }
}

/// Drives one entry at a time through the item state machine.
pub(crate) struct ItemProcessor<'a> {
    pub(crate) downloader: &'a dyn AssetDownloader,
    pub(crate) destination: &'a dyn Destination,
    pub(crate) pacer: &'a Pacer,
    pub(crate) retry: &'a RetryPolicy,
}

impl ItemProcessor<'_> {
    /// Processes `entry`, updating the context's counters and index.
    ///
    /// Every failure stays with the item: it is counted, announced in the
    /// item's thread and the run moves on.
    #[instrument(skip(self, ctx, entry), fields(url = %entry.url, destination = %ctx.params.destination_id))]
    pub(crate) async fn process(&self, ctx: &mut RunContext, entry: &LinkEntry) -> ItemOutcome {
        let topic = extract_topic(&entry.name);
        let safe_name = sanitize_display_name(&entry.name, MAX_BASE_NAME_CHARS);
        let thread = ctx.threads.resolve(self.destination, &topic).await;

        let mut state = ItemState::Pending;
        let result = self
            .run_steps(ctx, entry, &topic, &safe_name, thread, &mut state)
            .await;

        match result {
            Ok(link) => {
                let indexed = TopicIndexEntry::new(format!("{topic} | {safe_name}"), link);
                ctx.store.append(&topic, indexed.clone()).await;
                ctx.counts.sent += 1;
                info!(topic = %topic, name = %safe_name, "item indexed");
                ItemOutcome::Indexed {
                    topic,
                    entry: indexed,
                }
            }
            Err(reason) => {
                warn!(step = %state, topic = %topic, reason = %reason, "item failed");
                ctx.counts.failed += 1;
                let notice = failure_notice(&safe_name, &reason);
                if let Err(e) = self
                    .destination
                    .send_notice(ctx.params.destination_id, &notice, thread)
                    .await
                {
                    warn!(error = %e, "could not post failure notice");
                }
                ItemOutcome::Failed {
                    step: state,
                    reason,
                }
            }
        }
    }

    async fn run_steps(
        &self,
        ctx: &mut RunContext,
        entry: &LinkEntry,
        topic: &str,
        safe_name: &str,
        thread: Option<ThreadId>,
        state: &mut ItemState,
    ) -> Result<String, String> {
        let destination = ctx.params.destination_id;

        *state = ItemState::Downloading;
        let asset = self
            .with_rate_limit_retry(destination, &mut ctx.rate_limit_retries, || {
                self.downloader.download(&entry.url, safe_name)
            })
            .await?;
        debug!(asset = %asset.display(), "asset downloaded");

        *state = ItemState::Uploading;
        let request = UploadRequest {
            caption: build_caption(topic, safe_name, &ctx.params.batch_name, &ctx.params.credit),
            asset,
            resolution: ctx.params.resolution.clone(),
            watermark: ctx.params.watermark.clone(),
            credit: ctx.params.credit.clone(),
            destination,
            thread,
        };
        let uploaded = self
            .with_rate_limit_retry(destination, &mut ctx.rate_limit_retries, || {
                self.destination.upload(&request)
            })
            .await;
        remove_asset(&request.asset).await;
        let uploaded = uploaded?;

        *state = ItemState::LinkBuilding;
        let message = match uploaded {
            Some(message) => message,
            None => {
                debug!("upload returned no message, posting notice instead");
                let notice = uploaded_notice(safe_name);
                self.with_rate_limit_retry(destination, &mut ctx.rate_limit_retries, || {
                    self.destination.send_notice(destination, &notice, thread)
                })
                .await?
            }
        };
        let link = permalink_for(self.destination, message).await;

        *state = ItemState::Indexed;
        Ok(link)
    }

    /// Runs `step`, sleeping and retrying while it reports a rate limit and
    /// the retry policy allows it. The error is the reason the item failed.
    async fn with_rate_limit_retry<T, E, F, Fut>(
        &self,
        destination: DestinationId,
        retries: &mut u32,
        mut step: F,
    ) -> Result<T, String>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ClassifyFailure,
    {
        let mut attempt = 1;
        loop {
            match StepOutcome::from_result(step().await) {
                StepOutcome::Ok(value) => return Ok(value),
                StepOutcome::Skip(reason) => return Err(reason),
                StepOutcome::Fatal(reason) => {
                    // Run-level refusals were ruled out before the first item;
                    // here they only cost the current item.
                    debug!(reason = %reason, "fatal error confined to item");
                    return Err(reason);
                }
                StepOutcome::Retryable { wait, reason } => {
                    match self
                        .retry
                        .should_retry(FailureType::RateLimited(wait), attempt)
                    {
                        RetryDecision::Retry {
                            delay,
                            attempt: next,
                        } => {
                            warn!(
                                wait_ms = delay.as_millis(),
                                attempt = next,
                                reason = %reason,
                                "rate limited, waiting before retry"
                            );
                            self.pacer.record_rate_limit(destination, delay);
                            tokio::time::sleep(delay).await;
                            *retries += 1;
                            attempt = next;
                        }
                        RetryDecision::DoNotRetry { reason: why } => {
                            return Err(format!("{reason} ({why})"));
                        }
                    }
                }
            }
        }
    }
}

async fn remove_asset(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!(path = %path.display(), error = %e, "could not remove downloaded asset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_state_display() {
        assert_eq!(ItemState::Downloading.to_string(), "downloading");
        assert_eq!(ItemState::LinkBuilding.to_string(), "link-building");
    }

    #[test]
    fn test_item_outcome_is_indexed() {
        let indexed = ItemOutcome::Indexed {
            topic: "General".to_string(),
            entry: TopicIndexEntry::new("General | a", "https://t.me/x/1"),
        };
        let failed = ItemOutcome::Failed {
            step: ItemState::Uploading,
            reason: "boom".to_string(),
        };
        assert!(indexed.is_indexed());
        assert!(!failed.is_indexed());
    }
}
