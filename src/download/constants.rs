//! Constants for the download module (timeouts, rate-limit waits).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Wait applied to a 429 response that carries no usable Retry-After header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);
