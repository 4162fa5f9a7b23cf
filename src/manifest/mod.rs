//! Manifest parsing: raw multi-line text into ordered link entries.
//!
//! A manifest is free text. Every line that contains an `http://` or
//! `https://` token yields one [`LinkEntry`]; the first such token is the
//! URL and the text before it is the entry's display name.
//!
//! ```
//! use uploader_core::manifest::parse_manifest;
//!
//! let entries = parse_manifest("Physics Ch1 (Mechanics): https://x/y.mp4").unwrap();
//! assert_eq!(entries[0].name, "Physics Ch1 (Mechanics)");
//! assert_eq!(entries[0].url, "https://x/y.mp4");
//! ```

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, trace};

/// First HTTP(S)-looking token on a line.
#[allow(clippy::expect_used)]
static URL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("URL token regex is valid"));

/// Errors produced while reading a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    /// No line of the manifest carried a URL.
    #[error("manifest contains no links\n  Suggestion: put one `name: https://...` entry per line")]
    Empty,
}

/// One named asset link from the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    /// Display name; the line text before the URL.
    pub name: String,
    /// The asset URL.
    pub url: String,
}

impl LinkEntry {
    /// Creates an entry from a name and URL.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Raw manifest text plus the name of the file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSource {
    /// File name of the manifest, e.g. `physics_batch.txt`.
    pub name: String,
    /// Full manifest contents.
    pub text: String,
}

impl ManifestSource {
    /// Creates a manifest source.
    #[must_use]
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Batch name used when the operator does not supply one.
    ///
    /// The file stem with underscores turned into spaces.
    #[must_use]
    pub fn default_batch_name(&self) -> String {
        let stem = Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name);
        stem.replace('_', " ").trim().to_string()
    }
}

/// Parses manifest text into its ordered link entries.
///
/// Lines without a URL are skipped. When nothing before the URL survives
/// trimming of whitespace, `:` and `|`, the URL doubles as the name.
///
/// # Errors
///
/// Returns [`ManifestError::Empty`] when no line carries a URL.
#[instrument(skip(text), fields(text_len = text.len()))]
pub fn parse_manifest(text: &str) -> Result<Vec<LinkEntry>, ManifestError> {
    let entries: Vec<LinkEntry> = text.lines().filter_map(parse_line).collect();

    if entries.is_empty() {
        debug!("manifest has no link lines");
        return Err(ManifestError::Empty);
    }

    debug!(count = entries.len(), "parsed manifest");
    Ok(entries)
}

fn parse_line(line: &str) -> Option<LinkEntry> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let token = URL_TOKEN.find(line)?;
    let url = token.as_str().to_string();
    let name = line[..token.start()]
        .trim_end_matches(|c: char| c == ':' || c == '|' || c.is_whitespace())
        .trim_start();

    trace!(url = %url, "manifest line");
    let name = if name.is_empty() {
        url.clone()
    } else {
        name.to_string()
    };
    Some(LinkEntry { name, url })
}
