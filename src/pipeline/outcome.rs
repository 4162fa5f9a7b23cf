//! Classification of collaborator failures.
//!
//! Every collaborator error is classified once into a [`FailureType`];
//! callers then branch on [`StepOutcome`] instead of inspecting error
//! variants.

use std::fmt::Display;
use std::time::Duration;

use crate::destination::PlatformError;
use crate::download::DownloadError;

/// What a failure means for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// The collaborator asked us to wait this long and try again.
    RateLimited(Duration),
    /// The current item cannot succeed; move on.
    Permanent,
    /// The whole run cannot continue.
    Fatal,
}

/// Errors that know what they mean for the run.
pub trait ClassifyFailure: Display {
    /// Classifies this error.
    fn failure_type(&self) -> FailureType;
}

impl ClassifyFailure for DownloadError {
    fn failure_type(&self) -> FailureType {
        match self {
            Self::RateLimited { retry_after, .. } => FailureType::RateLimited(*retry_after),
            _ => FailureType::Permanent,
        }
    }
}

impl ClassifyFailure for PlatformError {
    fn failure_type(&self) -> FailureType {
        match self {
            Self::RateLimited { retry_after } => FailureType::RateLimited(*retry_after),
            Self::PermissionDenied { .. } => FailureType::Fatal,
            _ => FailureType::Permanent,
        }
    }
}

/// Result of one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome<T> {
    /// The step succeeded.
    Ok(T),
    /// The step may succeed after waiting.
    Retryable {
        /// Requested wait.
        wait: Duration,
        /// Error text.
        reason: String,
    },
    /// The item fails; the run continues.
    Skip(String),
    /// The run must stop, unless the caller is confined to one item.
    Fatal(String),
}

impl<T> StepOutcome<T> {
    /// Classifies a collaborator result.
    pub fn from_result<E: ClassifyFailure>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(error) => match error.failure_type() {
                FailureType::RateLimited(wait) => Self::Retryable {
                    wait,
                    reason: error.to_string(),
                },
                FailureType::Permanent => Self::Skip(error.to_string()),
                FailureType::Fatal => Self::Fatal(error.to_string()),
            },
        }
    }
}
