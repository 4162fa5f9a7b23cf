//! Run parameter collection.
//!
//! [`ParameterCollector`] is the six-step state machine;
//! [`collect_parameters`] drives it against an [`EventSource`] with a hard
//! timeout on every reply.

mod collector;
mod events;

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument};

pub use collector::{
    CollectedParameters, CollectorError, CollectorState, DEFAULT_CREDIT, DEFAULT_RESOLUTION,
    DEFAULT_START_INDEX, DEFAULT_WATERMARK, DefaultReason, KNOWN_RESOLUTIONS, ParameterCollector,
    ParameterDefaults, ParameterStep, Prompt, Reply, SKIP_SENTINEL, StepRecord, StepResolution,
    clamp_start_index, normalize_resolution,
};
pub use events::{ChannelEventSource, EventSource, EventSourceError, OperatorEvent, OperatorHandle};

use crate::destination::DestinationId;

/// Default wait for each reply.
pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(20);

/// Final parameters of a run, with the destination resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParameters {
    /// Batch name.
    pub batch_name: String,
    /// 1-based index of the first entry to process.
    pub start_index: usize,
    /// Requested rendition.
    pub resolution: String,
    /// Watermark label.
    pub watermark: String,
    /// Credit line.
    pub credit: String,
    /// Where items are posted.
    pub destination_id: DestinationId,
}

impl RunParameters {
    /// The tuple produced when every step falls back to its default.
    #[must_use]
    pub fn defaults(defaults: &ParameterDefaults, destination_id: DestinationId) -> Self {
        Self {
            batch_name: defaults.batch_name.clone(),
            start_index: DEFAULT_START_INDEX,
            resolution: defaults.resolution.clone(),
            watermark: defaults.watermark.clone(),
            credit: defaults.credit.clone(),
            destination_id,
        }
    }

    /// Combines collected answers with a resolved destination.
    #[must_use]
    pub fn from_collected(collected: CollectedParameters, destination_id: DestinationId) -> Self {
        Self {
            batch_name: collected.batch_name,
            start_index: collected.start_index,
            resolution: collected.resolution,
            watermark: collected.watermark,
            credit: collected.credit,
            destination_id,
        }
    }
}

/// Failure while running the conversation.
#[derive(Debug, Error)]
pub enum CollectError {
    /// A prompt could not be shown.
    #[error("could not present {step} prompt: {source}")]
    Present {
        /// The step being asked.
        step: ParameterStep,
        /// The underlying failure.
        #[source]
        source: EventSourceError,
    },

    /// The state machine was left unfinished.
    #[error(transparent)]
    Collector(#[from] CollectorError),
}

/// Runs the conversation to completion.
///
/// Every reply wait is bounded by `reply_timeout`; a timeout or a closed
/// source settles the step with its default.
///
/// # Errors
///
/// Returns [`CollectError::Present`] when a prompt cannot be shown.
#[instrument(skip(events, collector), fields(timeout_ms = reply_timeout.as_millis()))]
pub async fn collect_parameters(
    events: &mut dyn EventSource,
    mut collector: ParameterCollector,
    reply_timeout: Duration,
) -> Result<CollectedParameters, CollectError> {
    while let Some(prompt) = collector.begin_prompt() {
        let step = prompt.step;
        events
            .present(&prompt)
            .await
            .map_err(|source| CollectError::Present { step, source })?;

        let reply = match tokio::time::timeout(reply_timeout, events.next_reply()).await {
            Ok(Some(text)) => Reply::Text(text),
            Ok(None) => Reply::Closed,
            Err(_) => Reply::TimedOut,
        };

        if let Some(record) = collector.receive(reply) {
            match record.resolution {
                StepResolution::Applied => {
                    debug!(step = %step, number = step.number(), "parameter applied");
                }
                StepResolution::Defaulted(reason) => {
                    info!(step = %step, number = step.number(), ?reason, "parameter defaulted");
                }
            }
        }
    }

    Ok(collector.finish()?)
}
