//! Free-text destination references.

use tracing::{debug, instrument, warn};

use super::{Destination, DestinationId};
use crate::params::SKIP_SENTINEL;

/// A parsed destination reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationReference {
    /// Use the fallback destination.
    UseFallback,
    /// A numeric id such as `-1001234567890`.
    Id(DestinationId),
    /// A public handle, without `@`.
    Handle(String),
}

impl DestinationReference {
    /// Parses a reference.
    ///
    /// Accepts the skip sentinel `/d` (or blank text), a signed integer id,
    /// `@handle`, `t.me/handle` and `http(s)://t.me/handle[/...]`. Returns
    /// `None` for anything else.
    ///
    /// # Examples
    ///
    /// ```
    /// use uploader_core::destination::{DestinationId, DestinationReference};
    ///
    /// assert_eq!(
    ///     DestinationReference::parse("https://t.me/physics_hub/12"),
    ///     Some(DestinationReference::Handle("physics_hub".into()))
    /// );
    /// assert_eq!(
    ///     DestinationReference::parse("-1001234"),
    ///     Some(DestinationReference::Id(DestinationId(-1_001_234)))
    /// );
    /// ```
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case(SKIP_SENTINEL) {
            return Some(Self::UseFallback);
        }

        if let Some(rest) = strip_handle_prefix(text) {
            let handle = rest.split('/').next().unwrap_or_default().trim();
            return (!handle.is_empty()).then(|| Self::Handle(handle.to_string()));
        }

        text.parse::<i64>().ok().map(|id| Self::Id(DestinationId(id)))
    }
}

fn strip_handle_prefix(text: &str) -> Option<&str> {
    for prefix in ["https://t.me/", "http://t.me/", "t.me/", "@"] {
        if let Some(rest) = text.strip_prefix(prefix) {
            return Some(rest.trim_start_matches('@'));
        }
    }
    None
}

/// Resolves a free-text destination reference to a destination id.
///
/// Never fails: unparseable text or a failed handle lookup yields
/// `fallback`.
#[instrument(skip(platform), fields(fallback = %fallback))]
pub async fn resolve_destination(
    platform: &dyn Destination,
    text: &str,
    fallback: DestinationId,
) -> DestinationId {
    match DestinationReference::parse(text) {
        Some(DestinationReference::UseFallback) => fallback,
        Some(DestinationReference::Id(id)) => id,
        Some(DestinationReference::Handle(handle)) => {
            match platform.resolve_handle(&handle).await {
                Ok(id) => {
                    debug!(handle = %handle, destination = %id, "resolved handle");
                    id
                }
                Err(error) => {
                    warn!(handle = %handle, error = %error, "handle lookup failed, using fallback");
                    fallback
                }
            }
        }
        None => {
            warn!(reference = %text, "unrecognised destination reference, using fallback");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skip_sentinel_and_blank() {
        assert_eq!(
            DestinationReference::parse("/d"),
            Some(DestinationReference::UseFallback)
        );
        assert_eq!(
            DestinationReference::parse(" /D "),
            Some(DestinationReference::UseFallback)
        );
        assert_eq!(
            DestinationReference::parse(""),
            Some(DestinationReference::UseFallback)
        );
    }

    #[test]
    fn test_parse_numeric_ids() {
        assert_eq!(
            DestinationReference::parse("-1001234567890"),
            Some(DestinationReference::Id(DestinationId(-1_001_234_567_890)))
        );
        assert_eq!(
            DestinationReference::parse("42"),
            Some(DestinationReference::Id(DestinationId(42)))
        );
    }

    #[test]
    fn test_parse_handle_forms() {
        for text in [
            "@physics_hub",
            "t.me/physics_hub",
            "https://t.me/physics_hub",
            "http://t.me/physics_hub/55",
        ] {
            assert_eq!(
                DestinationReference::parse(text),
                Some(DestinationReference::Handle("physics_hub".to_string())),
                "{text}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(DestinationReference::parse("my channel"), None);
        assert_eq!(DestinationReference::parse("@"), None);
        assert_eq!(DestinationReference::parse("https://t.me/"), None);
    }
}
