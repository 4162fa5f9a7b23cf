//! Topic labels derived from entry names.
//!
//! An entry's topic is the first parenthesised group in its name, so
//! `"Physics Ch1 (Mechanics)"` files under `Mechanics`. Names without a
//! group fall under [`DEFAULT_TOPIC`].

use std::sync::LazyLock;

use regex::Regex;

/// Topic used when a name has no parenthesised group.
pub const DEFAULT_TOPIC: &str = "General";

#[allow(clippy::expect_used)]
static TOPIC_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]+)\)").expect("topic regex is valid"));

/// Returns the topic label for an entry name.
///
/// # Examples
///
/// ```
/// use uploader_core::topics::extract_topic;
///
/// assert_eq!(extract_topic("Physics Ch1 (Mechanics)"), "Mechanics");
/// assert_eq!(extract_topic("Intro lecture"), "General");
/// ```
#[must_use]
pub fn extract_topic(name: &str) -> String {
    TOPIC_GROUP
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|group| group.as_str().trim())
        .filter(|topic| !topic.is_empty())
        .unwrap_or(DEFAULT_TOPIC)
        .to_string()
}
