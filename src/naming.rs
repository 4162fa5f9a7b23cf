//! Name sanitisation for uploaded files, snapshot files and rendered text.

/// Maximum length of a sanitised item base name, in characters.
pub const MAX_BASE_NAME_CHARS: usize = 60;

/// Maximum length of the batch part of a snapshot file name, in characters.
pub const MAX_SNAPSHOT_STEM_CHARS: usize = 60;

/// Base name used when nothing of the item name survives sanitisation.
const FALLBACK_BASE_NAME: &str = "file";

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Sanitises an item name into a file base name.
///
/// Characters other than word characters, whitespace, `-`, `.` and `,`
/// become spaces; runs of whitespace collapse to one space; the result is
/// trimmed and capped at `limit` characters.
///
/// # Examples
///
/// ```
/// use uploader_core::naming::sanitize_display_name;
///
/// assert_eq!(sanitize_display_name("Ch 1: Motion / Part#2", 60), "Ch 1 Motion Part 2");
/// ```
#[must_use]
pub fn sanitize_display_name(name: &str, limit: usize) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if is_word_char(c) || c.is_whitespace() || matches!(c, '-' | '.' | ',') {
                c
            } else {
                ' '
            }
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(limit).collect();
    let capped = capped.trim_end().to_string();

    if capped.is_empty() {
        FALLBACK_BASE_NAME.to_string()
    } else {
        capped
    }
}

/// Builds the snapshot file name for a batch: `topic_index_<safe>.json`.
///
/// Every character outside word characters, `-`, `.` and space becomes
/// `_`, and the result keeps its first 60 characters. An empty batch name
/// maps to `batch`.
#[must_use]
pub fn snapshot_file_name(batch_name: &str) -> String {
    let source = if batch_name.is_empty() {
        "batch"
    } else {
        batch_name
    };
    let safe: String = source
        .chars()
        .map(|c| {
            if is_word_char(c) || matches!(c, '-' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_SNAPSHOT_STEM_CHARS)
        .collect();
    format!("topic_index_{safe}.json")
}

/// Escapes text for inclusion in HTML-formatted messages.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// Keeps the first `max_chars` characters of `text`, appending `…` when cut.
#[must_use]
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_display_name_replaces_and_collapses() {
        assert_eq!(
            sanitize_display_name("Ch 1: Motion / Part#2", MAX_BASE_NAME_CHARS),
            "Ch 1 Motion Part 2"
        );
        assert_eq!(
            sanitize_display_name("  a\t\tb  ", MAX_BASE_NAME_CHARS),
            "a b"
        );
    }

    #[test]
    fn test_sanitize_display_name_keeps_allowed_punctuation() {
        assert_eq!(
            sanitize_display_name("Vol.2, part-1 (draft)", MAX_BASE_NAME_CHARS),
            "Vol.2, part-1 draft"
        );
    }

    #[test]
    fn test_sanitize_display_name_caps_length() {
        let long = "x".repeat(100);
        assert_eq!(
            sanitize_display_name(&long, MAX_BASE_NAME_CHARS).chars().count(),
            MAX_BASE_NAME_CHARS
        );
    }

    #[test]
    fn test_sanitize_display_name_unicode_letters_survive() {
        assert_eq!(sanitize_display_name("भौतिकी 1", 60), "भौतिकी 1");
    }

    #[test]
    fn test_sanitize_display_name_empty_falls_back() {
        assert_eq!(sanitize_display_name("///", MAX_BASE_NAME_CHARS), "file");
    }

    #[test]
    fn test_snapshot_file_name_sanitizes() {
        assert_eq!(
            snapshot_file_name("Physics: Class/11"),
            "topic_index_Physics_ Class_11.json"
        );
    }

    #[test]
    fn test_snapshot_file_name_empty_batch() {
        assert_eq!(snapshot_file_name(""), "topic_index_batch.json");
    }

    #[test]
    fn test_snapshot_file_name_caps_length() {
        let name = snapshot_file_name(&"b".repeat(200));
        assert_eq!(name.len(), "topic_index_.json".len() + MAX_SNAPSHOT_STEM_CHARS);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b & 'c'>"), "a&lt;b &amp; &#x27;c&#x27;&gt;");
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("short", 80), "short");
        let cut = truncate_with_ellipsis(&"a".repeat(100), 80);
        assert_eq!(cut.chars().count(), 81);
        assert!(cut.ends_with('…'));
    }
}
