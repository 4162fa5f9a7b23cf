//! The batch pipeline.
//!
//! [`run_batch`] (or a configured [`BatchRunner`]) takes one manifest from
//! raw text to a finished topic index:
//!
//! 1. parse the manifest; an empty one stops the run before any post
//! 2. collect run parameters from the operator
//! 3. resolve the destination and check that we may post there
//! 4. process entries one at a time from the start index
//! 5. post the summary and the index pages
//!
//! Item failures stay inside the item. Only an empty manifest, a denied
//! destination or a startup failure end a run early, as [`RunError`].

mod caption;
mod context;
mod outcome;
mod pacing;
mod processor;
mod retry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

pub use caption::{build_caption, completion_notice, failure_notice, uploaded_notice};
pub use context::RunContext;
pub use outcome::{ClassifyFailure, FailureType, StepOutcome};
pub use pacing::{DEFAULT_ITEM_DELAY, Pacer};
pub use processor::{ItemOutcome, ItemState};
pub use retry::{
    DEFAULT_MAX_RATE_LIMIT_WAIT, DEFAULT_RATE_LIMIT_RETRIES, RetryDecision, RetryPolicy,
};

use crate::destination::{Destination, DestinationId, ForumTopicResolver, resolve_destination};
use crate::download::AssetDownloader;
use crate::index::{IndexSink, SnapshotFileSink, TopicIndex, TopicIndexStore};
use crate::manifest::{LinkEntry, ManifestSource, parse_manifest};
use crate::params::{
    DEFAULT_CREDIT, DEFAULT_PROMPT_TIMEOUT, DEFAULT_RESOLUTION, DEFAULT_WATERMARK, EventSource,
    ParameterCollector, ParameterDefaults, RunParameters, collect_parameters,
};
use crate::report::{DEFAULT_PAGE_BUDGET, RunCounts, render_summary, render_topic_pages};
use processor::ItemProcessor;

/// Reasons a run ends early.
#[derive(Debug, Error)]
pub enum RunError {
    /// The manifest contained no links; nothing was posted.
    #[error("no links found in manifest")]
    EmptyManifest,

    /// We may not post in the chosen destination.
    #[error("not allowed to post in destination {destination}")]
    PermissionDenied {
        /// The destination that refused us.
        destination: DestinationId,
    },

    /// The run could not be set up.
    #[error("startup failed: {reason}")]
    Startup {
        /// What went wrong.
        reason: String,
    },
}

impl RunError {
    /// Creates a startup error.
    pub fn startup(reason: impl Into<String>) -> Self {
        Self::Startup {
            reason: reason.into(),
        }
    }
}

/// Collaborators a run talks to.
#[derive(Clone)]
pub struct RunServices {
    /// Fetches assets.
    pub downloader: Arc<dyn AssetDownloader>,
    /// Where items and notices are posted.
    pub destination: Arc<dyn Destination>,
    /// Durable copy of the index, keyed by batch name.
    pub durable_sink: Arc<dyn IndexSink>,
    /// Per-destination pacing, shareable across runs.
    pub pacer: Arc<Pacer>,
}

impl std::fmt::Debug for RunServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunServices")
            .field("durable_sink", &self.durable_sink.name())
            .field("pacer", &self.pacer)
            .finish_non_exhaustive()
    }
}

/// Tunables of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Wait for each parameter reply.
    pub prompt_timeout: Duration,
    /// Character budget of one index page.
    pub page_budget: usize,
    /// Credit used when the operator gives none.
    pub default_credit: String,
    /// Watermark used when the operator gives none.
    pub default_watermark: String,
    /// Directory receiving snapshot files.
    pub snapshot_dir: PathBuf,
    /// Rate-limit retry policy.
    pub retry_policy: RetryPolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            prompt_timeout: DEFAULT_PROMPT_TIMEOUT,
            page_budget: DEFAULT_PAGE_BUDGET,
            default_credit: DEFAULT_CREDIT.to_string(),
            default_watermark: DEFAULT_WATERMARK.to_string(),
            snapshot_dir: PathBuf::from("."),
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Entries scheduled from the start index.
    pub total_links: usize,
    /// Entries uploaded and indexed.
    pub sent_count: usize,
    /// Entries that failed.
    pub failed_count: usize,
    /// Batch name used for captions and persistence.
    pub batch_name: String,
    /// Where items were posted.
    pub destination_id: DestinationId,
    /// Final in-memory index.
    pub index: TopicIndex,
    /// Snapshot file written for this batch.
    pub snapshot_path: PathBuf,
    /// Failed sink writes during the run.
    pub persistence_failures: usize,
    /// Rate-limit retries performed.
    pub rate_limit_retries: u32,
}

/// Hooks for progress reporting.
pub trait RunObserver: Send + Sync {
    /// Called once the entries to process are known.
    fn on_start(&self, _total: usize) {}

    /// Called before an entry is processed; `position` is 1-based within the run.
    fn on_item_start(&self, _position: usize, _entry: &LinkEntry) {}

    /// Called after an entry settled.
    fn on_item_finish(&self, _position: usize, _outcome: &ItemOutcome) {}

    /// Called when processing is over.
    fn on_finish(&self, _counts: RunCounts) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Runs batches against one set of collaborators.
pub struct BatchRunner {
    services: RunServices,
    settings: RunSettings,
    observer: Arc<dyn RunObserver>,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("services", &self.services)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl BatchRunner {
    /// Creates a runner.
    #[must_use]
    pub fn new(services: RunServices, settings: RunSettings) -> Self {
        Self {
            services,
            settings,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Sets the progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Runs one batch.
    ///
    /// `initial` is the chat the request came from; it is the default
    /// destination and receives the completion notice when items went
    /// elsewhere.
    ///
    /// # Errors
    ///
    /// - [`RunError::EmptyManifest`] when the manifest has no links
    /// - [`RunError::PermissionDenied`] when the destination refuses posts
    ///   before any item starts
    /// - [`RunError::Startup`] when the operator conversation breaks down
    #[instrument(skip(self, manifest, events), fields(manifest = %manifest.name, initial = %initial))]
    pub async fn run(
        &self,
        manifest: &ManifestSource,
        initial: DestinationId,
        events: &mut dyn EventSource,
    ) -> Result<RunResult, RunError> {
        let Ok(entries) = parse_manifest(&manifest.text) else {
            info!("manifest has no links");
            if let Err(e) = events.notify("No links found in the manifest.").await {
                debug!(error = %e, "could not tell operator about empty manifest");
            }
            return Err(RunError::EmptyManifest);
        };
        info!(links = entries.len(), "manifest parsed");

        let params = self.collect(manifest, &entries, initial, events).await?;
        let destination = self.services.destination.as_ref();
        self.check_can_post(params.destination_id).await?;

        let threads = ForumTopicResolver::for_destination(destination, params.destination_id).await;
        let snapshot_sink = SnapshotFileSink::new(&self.settings.snapshot_dir);
        let snapshot_path = snapshot_sink.path_for(&params.batch_name);
        let sinks: Vec<Arc<dyn IndexSink>> = vec![
            Arc::clone(&self.services.durable_sink),
            Arc::new(snapshot_sink),
        ];
        let store = TopicIndexStore::new(params.batch_name.clone(), sinks);

        let start = params.start_index.max(1) - 1;
        let scheduled = entries.get(start..).unwrap_or_default();
        let mut ctx = RunContext::new(params, threads, store, scheduled.len());

        if let Err(e) = events
            .notify(&format!(
                "Processing {} links into {}.",
                scheduled.len(),
                ctx.params.destination_id
            ))
            .await
        {
            debug!(error = %e, "could not tell operator the run started");
        }

        self.process_all(&mut ctx, scheduled).await;
        self.post_report(&ctx, initial).await;

        let RunContext {
            params,
            store,
            counts,
            rate_limit_retries,
            ..
        } = ctx;
        let persistence_failures = store.persistence_failures();
        info!(
            batch = %params.batch_name,
            total = counts.total,
            sent = counts.sent,
            failed = counts.failed,
            persistence_failures,
            "run finished"
        );

        Ok(RunResult {
            total_links: counts.total,
            sent_count: counts.sent,
            failed_count: counts.failed,
            batch_name: params.batch_name,
            destination_id: params.destination_id,
            index: store.into_index(),
            snapshot_path,
            persistence_failures,
            rate_limit_retries,
        })
    }

    async fn collect(
        &self,
        manifest: &ManifestSource,
        entries: &[LinkEntry],
        initial: DestinationId,
        events: &mut dyn EventSource,
    ) -> Result<RunParameters, RunError> {
        let defaults = ParameterDefaults {
            batch_name: manifest.default_batch_name(),
            resolution: DEFAULT_RESOLUTION.to_string(),
            watermark: self.settings.default_watermark.clone(),
            credit: self.settings.default_credit.clone(),
        };
        let collector = ParameterCollector::new(defaults, entries.len());
        let collected = collect_parameters(events, collector, self.settings.prompt_timeout)
            .await
            .map_err(|e| RunError::startup(e.to_string()))?;

        let reference = collected.destination.clone().unwrap_or_default();
        let destination_id =
            resolve_destination(self.services.destination.as_ref(), &reference, initial).await;
        let params = RunParameters::from_collected(collected, destination_id);
        debug!(?params, "run parameters settled");
        Ok(params)
    }

    async fn check_can_post(&self, destination: DestinationId) -> Result<(), RunError> {
        match StepOutcome::from_result(self.services.destination.can_post(destination).await) {
            StepOutcome::Ok(true) => Ok(()),
            StepOutcome::Ok(false) | StepOutcome::Fatal(_) => {
                warn!(destination = %destination, "posting not allowed");
                Err(RunError::PermissionDenied { destination })
            }
            StepOutcome::Retryable { reason, .. } | StepOutcome::Skip(reason) => Err(
                RunError::startup(format!("could not check destination {destination}: {reason}")),
            ),
        }
    }

    async fn process_all(&self, ctx: &mut RunContext, scheduled: &[LinkEntry]) {
        let processor = ItemProcessor {
            downloader: self.services.downloader.as_ref(),
            destination: self.services.destination.as_ref(),
            pacer: self.services.pacer.as_ref(),
            retry: &self.settings.retry_policy,
        };

        self.observer.on_start(scheduled.len());
        for (offset, entry) in scheduled.iter().enumerate() {
            let position = offset + 1;
            self.services.pacer.acquire(ctx.params.destination_id).await;
            self.observer.on_item_start(position, entry);

            let outcome = processor.process(ctx, entry).await;
            self.observer.on_item_finish(position, &outcome);
        }
        self.observer.on_finish(ctx.counts);
    }

    async fn post_report(&self, ctx: &RunContext, initial: DestinationId) {
        let destination = self.services.destination.as_ref();
        let target = ctx.params.destination_id;

        let summary = render_summary(&ctx.params.batch_name, ctx.counts);
        let pages = render_topic_pages(ctx.store.index(), self.settings.page_budget);
        debug!(pages = pages.len(), "posting report");

        for text in std::iter::once(summary).chain(pages) {
            if let Err(e) = destination.send_notice(target, &text, None).await {
                warn!(error = %e, "could not post report page");
            }
        }

        if target != initial {
            let notice = completion_notice(target);
            if let Err(e) = destination.send_notice(initial, &notice, None).await {
                warn!(error = %e, "could not post completion notice");
            }
        }
    }
}

/// Runs one batch with default settings and no observer.
///
/// # Errors
///
/// See [`BatchRunner::run`].
pub async fn run_batch(
    services: RunServices,
    manifest: &ManifestSource,
    initial: DestinationId,
    events: &mut dyn EventSource,
) -> Result<RunResult, RunError> {
    BatchRunner::new(services, RunSettings::default())
        .run(manifest, initial, events)
        .await
}
