//! Parameter collection state machine.
//!
//! The collector never waits on anything itself. A driver asks it for the
//! next prompt ([`ParameterCollector::begin_prompt`]), obtains a reply
//! however it likes, and feeds it back ([`ParameterCollector::receive`]).
//! Each step moves `Prompting(step) -> Awaiting(step) -> Prompting(next)`
//! and the machine is terminal after the destination step.

use std::fmt;

use thiserror::Error;
use tracing::warn;

/// Start index used when none is given.
pub const DEFAULT_START_INDEX: usize = 1;

/// Resolution used when none is given.
pub const DEFAULT_RESOLUTION: &str = "480";

/// Watermark label used when none is given.
pub const DEFAULT_WATERMARK: &str = "Mrs.UC";

/// Credit line used when neither the operator nor configuration supplies one.
pub const DEFAULT_CREDIT: &str = "Anonymous";

/// Reply that selects a step's default.
pub const SKIP_SENTINEL: &str = "/d";

/// Resolutions the platform renders.
pub const KNOWN_RESOLUTIONS: [&str; 6] = ["144", "240", "360", "480", "720", "1080"];

/// The six questions, in the order they are asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterStep {
    /// 1-based index of the first entry to process.
    StartIndex,
    /// Batch name shown in captions and reports.
    BatchName,
    /// Requested rendition.
    Resolution,
    /// Watermark label.
    Watermark,
    /// Credit line.
    Credit,
    /// Destination reference.
    Destination,
}

impl ParameterStep {
    /// All steps in order.
    pub const ALL: [Self; 6] = [
        Self::StartIndex,
        Self::BatchName,
        Self::Resolution,
        Self::Watermark,
        Self::Credit,
        Self::Destination,
    ];

    /// The step after this one, or `None` after the last.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::StartIndex => Some(Self::BatchName),
            Self::BatchName => Some(Self::Resolution),
            Self::Resolution => Some(Self::Watermark),
            Self::Watermark => Some(Self::Credit),
            Self::Credit => Some(Self::Destination),
            Self::Destination => None,
        }
    }

    /// 1-based position of the step.
    #[must_use]
    pub fn number(self) -> usize {
        match self {
            Self::StartIndex => 1,
            Self::BatchName => 2,
            Self::Resolution => 3,
            Self::Watermark => 4,
            Self::Credit => 5,
            Self::Destination => 6,
        }
    }
}

impl fmt::Display for ParameterStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartIndex => "start index",
            Self::BatchName => "batch name",
            Self::Resolution => "resolution",
            Self::Watermark => "watermark",
            Self::Credit => "credit",
            Self::Destination => "destination",
        };
        f.write_str(name)
    }
}

/// Where the machine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    /// About to ask `step`.
    Prompting(ParameterStep),
    /// Asked `step`, waiting for the reply.
    Awaiting(ParameterStep),
    /// All steps answered.
    Complete,
}

/// A question to show the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Which step is asking.
    pub step: ParameterStep,
    /// Text to show.
    pub text: String,
}

/// What came back for a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The operator answered.
    Text(String),
    /// Nothing arrived before the step's timeout.
    TimedOut,
    /// The event source has no more replies.
    Closed,
}

/// Why a step fell back to its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultReason {
    /// The step timed out.
    Timeout,
    /// The event source was closed.
    SourceClosed,
    /// The operator sent the skip sentinel or an empty reply.
    Skip,
    /// A numeric reply did not parse.
    Invalid,
}

/// How a step was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResolution {
    /// The operator's reply was used.
    Applied,
    /// The documented default was used.
    Defaulted(DefaultReason),
}

/// Outcome of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRecord {
    /// The step settled.
    pub step: ParameterStep,
    /// How it was settled.
    pub resolution: StepResolution,
}

/// Defaults applied to steps without a usable reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDefaults {
    /// Batch name, normally derived from the manifest file name.
    pub batch_name: String,
    /// Resolution.
    pub resolution: String,
    /// Watermark label.
    pub watermark: String,
    /// Credit line.
    pub credit: String,
}

impl ParameterDefaults {
    /// Defaults for a batch with the stock resolution and watermark.
    pub fn new(batch_name: impl Into<String>, credit: impl Into<String>) -> Self {
        Self {
            batch_name: batch_name.into(),
            resolution: DEFAULT_RESOLUTION.to_string(),
            watermark: DEFAULT_WATERMARK.to_string(),
            credit: credit.into(),
        }
    }
}

/// Everything the collector gathered.
///
/// The destination stays a raw reference; turning it into an id needs the
/// destination platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedParameters {
    /// 1-based start index, clamped to the manifest.
    pub start_index: usize,
    /// Batch name.
    pub batch_name: String,
    /// Resolution.
    pub resolution: String,
    /// Watermark label.
    pub watermark: String,
    /// Credit line.
    pub credit: String,
    /// Destination reference, `None` for "current chat".
    pub destination: Option<String>,
}

/// Misuse of the collector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectorError {
    /// `finish` was called before the last step was settled.
    #[error("parameter collection stopped at step {step}")]
    Incomplete {
        /// The step still open.
        step: ParameterStep,
    },
}

/// Six-step parameter conversation as an explicit state machine.
#[derive(Debug, Clone)]
pub struct ParameterCollector {
    state: CollectorState,
    defaults: ParameterDefaults,
    entry_count: usize,
    collected: CollectedParameters,
    records: Vec<StepRecord>,
}

impl ParameterCollector {
    /// Creates a collector for a manifest of `entry_count` entries.
    #[must_use]
    pub fn new(defaults: ParameterDefaults, entry_count: usize) -> Self {
        let collected = CollectedParameters {
            start_index: DEFAULT_START_INDEX,
            batch_name: defaults.batch_name.clone(),
            resolution: defaults.resolution.clone(),
            watermark: defaults.watermark.clone(),
            credit: defaults.credit.clone(),
            destination: None,
        };
        Self {
            state: CollectorState::Prompting(ParameterStep::StartIndex),
            defaults,
            entry_count,
            collected,
            records: Vec::with_capacity(ParameterStep::ALL.len()),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CollectorState {
        self.state
    }

    /// Whether every step is settled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == CollectorState::Complete
    }

    /// Steps settled so far, in order.
    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Moves `Prompting(step)` to `Awaiting(step)` and returns the prompt.
    ///
    /// Returns `None` in any other state.
    pub fn begin_prompt(&mut self) -> Option<Prompt> {
        let CollectorState::Prompting(step) = self.state else {
            return None;
        };
        self.state = CollectorState::Awaiting(step);
        Some(Prompt {
            step,
            text: self.prompt_text(step),
        })
    }

    /// Settles the awaited step with `reply` and advances.
    ///
    /// Returns `None` (and changes nothing) unless a step is awaited.
    pub fn receive(&mut self, reply: Reply) -> Option<StepRecord> {
        let CollectorState::Awaiting(step) = self.state else {
            return None;
        };

        let resolution = match reply {
            Reply::TimedOut => StepResolution::Defaulted(DefaultReason::Timeout),
            Reply::Closed => StepResolution::Defaulted(DefaultReason::SourceClosed),
            Reply::Text(text) => self.apply(step, text.trim()),
        };

        let record = StepRecord { step, resolution };
        self.records.push(record);
        self.state = step
            .next()
            .map_or(CollectorState::Complete, CollectorState::Prompting);
        Some(record)
    }

    /// Returns the gathered parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Incomplete`] before the last step is settled.
    pub fn finish(self) -> Result<CollectedParameters, CollectorError> {
        match self.state {
            CollectorState::Complete => Ok(self.collected),
            CollectorState::Prompting(step) | CollectorState::Awaiting(step) => {
                Err(CollectorError::Incomplete { step })
            }
        }
    }

    fn apply(&mut self, step: ParameterStep, text: &str) -> StepResolution {
        if text.is_empty() || text.eq_ignore_ascii_case(SKIP_SENTINEL) {
            return StepResolution::Defaulted(DefaultReason::Skip);
        }

        match step {
            ParameterStep::StartIndex => match text.parse::<i64>() {
                Ok(index) => {
                    self.collected.start_index = clamp_start_index(index, self.entry_count);
                }
                Err(_) => return StepResolution::Defaulted(DefaultReason::Invalid),
            },
            ParameterStep::BatchName => self.collected.batch_name = text.to_string(),
            ParameterStep::Resolution => self.collected.resolution = normalize_resolution(text),
            ParameterStep::Watermark => self.collected.watermark = text.to_string(),
            ParameterStep::Credit => self.collected.credit = text.to_string(),
            ParameterStep::Destination => self.collected.destination = Some(text.to_string()),
        }
        StepResolution::Applied
    }

    fn prompt_text(&self, step: ParameterStep) -> String {
        match step {
            ParameterStep::StartIndex => format!(
                "Found {} links.\nSend start index (default {DEFAULT_START_INDEX}) or {SKIP_SENTINEL}.",
                self.entry_count
            ),
            ParameterStep::BatchName => format!(
                "Enter batch name or send {SKIP_SENTINEL} (default: {}).",
                self.defaults.batch_name
            ),
            ParameterStep::Resolution => format!(
                "Enter resolution ({}) or send {SKIP_SENTINEL} (default: {}).",
                KNOWN_RESOLUTIONS.join(", "),
                self.defaults.resolution
            ),
            ParameterStep::Watermark => format!(
                "Enter watermark text or send {SKIP_SENTINEL} (default: {}).",
                self.defaults.watermark
            ),
            ParameterStep::Credit => format!(
                "Enter credit name or send {SKIP_SENTINEL} (default: {}).",
                self.defaults.credit
            ),
            ParameterStep::Destination => format!(
                "Send destination id, @handle or t.me link, or {SKIP_SENTINEL} to use the current chat."
            ),
        }
    }
}

/// Clamps a 1-based start index to `[1, entry_count]`.
#[must_use]
pub fn clamp_start_index(index: i64, entry_count: usize) -> usize {
    let upper = entry_count.max(1);
    usize::try_from(index).map_or(1, |i| i.clamp(1, upper))
}

/// Normalises a resolution reply: `720p` becomes `720`.
///
/// Unknown values are kept verbatim.
#[must_use]
pub fn normalize_resolution(text: &str) -> String {
    let bare = text
        .strip_suffix('p')
        .or_else(|| text.strip_suffix('P'))
        .unwrap_or(text);
    if KNOWN_RESOLUTIONS.contains(&bare) {
        bare.to_string()
    } else {
        warn!(resolution = %text, "unrecognised resolution, passing through");
        text.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn collector(entries: usize) -> ParameterCollector {
        ParameterCollector::new(ParameterDefaults::new("physics batch", "Team"), entries)
    }

    fn answer_all(mut collector: ParameterCollector, replies: Vec<Reply>) -> ParameterCollector {
        for reply in replies {
            collector.begin_prompt().unwrap();
            collector.receive(reply).unwrap();
        }
        collector
    }

    #[test]
    fn test_state_walks_all_steps_in_order() {
        let mut c = collector(3);
        for step in ParameterStep::ALL {
            assert_eq!(c.state(), CollectorState::Prompting(step));
            let prompt = c.begin_prompt().unwrap();
            assert_eq!(prompt.step, step);
            assert_eq!(c.state(), CollectorState::Awaiting(step));
            c.receive(Reply::TimedOut).unwrap();
        }
        assert!(c.is_complete());
        assert_eq!(c.begin_prompt(), None);
        assert_eq!(c.receive(Reply::TimedOut), None);
    }

    #[test]
    fn test_receive_without_prompt_is_ignored() {
        let mut c = collector(3);
        assert_eq!(c.receive(Reply::Text("5".into())), None);
        assert_eq!(c.state(), CollectorState::Prompting(ParameterStep::StartIndex));
    }

    #[test]
    fn test_all_timeouts_yield_defaults() {
        let c = answer_all(collector(3), vec![Reply::TimedOut; 6]);
        assert!(
            c.records()
                .iter()
                .all(|r| r.resolution == StepResolution::Defaulted(DefaultReason::Timeout))
        );
        let params = c.finish().unwrap();
        assert_eq!(
            params,
            CollectedParameters {
                start_index: 1,
                batch_name: "physics batch".into(),
                resolution: "480".into(),
                watermark: "Mrs.UC".into(),
                credit: "Team".into(),
                destination: None,
            }
        );
    }

    #[test]
    fn test_replies_are_applied() {
        let replies = ["2", "Optics", "720p", "WM", "Me", "@hub"]
            .into_iter()
            .map(|s| Reply::Text(s.to_string()))
            .collect();
        let params = answer_all(collector(5), replies).finish().unwrap();
        assert_eq!(params.start_index, 2);
        assert_eq!(params.batch_name, "Optics");
        assert_eq!(params.resolution, "720");
        assert_eq!(params.watermark, "WM");
        assert_eq!(params.credit, "Me");
        assert_eq!(params.destination.as_deref(), Some("@hub"));
    }

    #[test]
    fn test_skip_sentinel_and_blank_use_defaults() {
        let mut replies = vec![Reply::Text("/D".into()), Reply::Text("   ".into())];
        replies.extend(vec![Reply::Text("/d".into()); 4]);
        let c = answer_all(collector(3), replies);
        assert!(
            c.records()
                .iter()
                .all(|r| r.resolution == StepResolution::Defaulted(DefaultReason::Skip))
        );
        assert_eq!(c.finish().unwrap().batch_name, "physics batch");
    }

    #[test]
    fn test_invalid_start_index_defaults() {
        let mut c = collector(3);
        c.begin_prompt().unwrap();
        let record = c.receive(Reply::Text("third".into())).unwrap();
        assert_eq!(
            record.resolution,
            StepResolution::Defaulted(DefaultReason::Invalid)
        );
    }

    #[test]
    fn test_start_index_is_clamped() {
        assert_eq!(clamp_start_index(0, 5), 1);
        assert_eq!(clamp_start_index(-3, 5), 1);
        assert_eq!(clamp_start_index(9, 5), 5);
        assert_eq!(clamp_start_index(3, 5), 3);
        assert_eq!(clamp_start_index(4, 0), 1);
    }

    #[test]
    fn test_normalize_resolution() {
        assert_eq!(normalize_resolution("1080p"), "1080");
        assert_eq!(normalize_resolution("360"), "360");
        assert_eq!(normalize_resolution("4k"), "4k");
    }

    #[test]
    fn test_finish_before_complete_is_error() {
        let mut c = collector(3);
        c.begin_prompt().unwrap();
        assert_eq!(
            c.finish(),
            Err(CollectorError::Incomplete {
                step: ParameterStep::StartIndex
            })
        );
    }

    #[test]
    fn test_first_prompt_mentions_link_count() {
        let mut c = collector(12);
        assert!(c.begin_prompt().unwrap().text.starts_with("Found 12 links."));
    }
}
