//! Stable links to posted messages.

use tracing::{debug, instrument};

use super::{Destination, DestinationId, MessageId, MessageRef};

const LINK_BASE: &str = "https://t.me";

/// Builds the permalink of a message.
///
/// With a public handle the link is `https://t.me/<handle>/<id>`. Otherwise
/// it is the private form `https://t.me/c/<internal>/<id>`, where
/// `<internal>` is the destination id without its `-100` prefix (or its
/// absolute value when there is no such prefix).
///
/// # Examples
///
/// ```
/// use uploader_core::destination::{DestinationId, MessageId, build_permalink};
///
/// assert_eq!(
///     build_permalink(DestinationId(-1_001_234), Some("physics"), MessageId(7)),
///     "https://t.me/physics/7"
/// );
/// assert_eq!(
///     build_permalink(DestinationId(-1_001_234), None, MessageId(7)),
///     "https://t.me/c/1234/7"
/// );
/// ```
#[must_use]
pub fn build_permalink(
    destination: DestinationId,
    handle: Option<&str>,
    message: MessageId,
) -> String {
    if let Some(handle) = handle.map(str::trim).filter(|h| !h.is_empty()) {
        return format!("{LINK_BASE}/{handle}/{message}");
    }

    let id = destination.0.to_string();
    let internal = match id.strip_prefix("-100") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => destination.0.unsigned_abs().to_string(),
    };
    format!("{LINK_BASE}/c/{internal}/{message}")
}

/// Builds the permalink of `message`, looking up the destination's handle.
///
/// A failed lookup falls back to the private link form.
#[instrument(skip(platform), fields(destination = %message.destination, message = %message.message_id))]
pub async fn permalink_for(platform: &dyn Destination, message: MessageRef) -> String {
    let handle = match platform.public_handle(message.destination).await {
        Ok(handle) => handle,
        Err(error) => {
            debug!(error = %error, "handle lookup failed, using private link");
            None
        }
    };
    build_permalink(message.destination, handle.as_deref(), message.message_id)
}
