//! Final run report: a summary message plus topic-grouped index pages.
//!
//! Pages are lists of whole lines joined by `\n` whose length never exceeds
//! the page budget (in characters).

use crate::index::TopicIndex;
use crate::naming::{escape_html, truncate_with_ellipsis};

/// Default page budget in characters.
pub const DEFAULT_PAGE_BUDGET: usize = 3900;

/// Longest entry title shown in an index line before it is cut.
pub const MAX_INDEX_TITLE_CHARS: usize = 80;

/// Counts shown in the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunCounts {
    /// Entries scheduled for processing.
    pub total: usize,
    /// Entries uploaded and indexed.
    pub sent: usize,
    /// Entries that failed.
    pub failed: usize,
}

/// Renders the summary message.
#[must_use]
pub fn render_summary(batch_name: &str, counts: RunCounts) -> String {
    format!(
        "<b>✨ Process Completed</b>\n\n\
         <blockquote><b>📌 Batch:</b> {batch}</blockquote>\n\
         ╭────────────────\n\
         ├ 🔗 Total URLs : <code>{total}</code>\n\
         ├ 🟢 Successful : <code>{sent}</code>\n\
         ├ ❌ Failed     : <code>{failed}</code>\n\
         ╰────────────────",
        batch = escape_html(batch_name),
        total = counts.total,
        sent = counts.sent,
        failed = counts.failed,
    )
}

/// Renders the index lines of one topic: a header, then one link per entry.
#[must_use]
pub fn topic_lines(topic: &str, entries: &[crate::index::TopicIndexEntry]) -> Vec<String> {
    let mut lines = Vec::with_capacity(entries.len() + 1);
    lines.push(format!("• <b>{}</b>", escape_html(topic)));
    for entry in entries {
        let short = truncate_with_ellipsis(&entry.title, MAX_INDEX_TITLE_CHARS);
        lines.push(format!(
            "  ─ <a href='{}'>{}</a>",
            escape_html(&entry.link),
            escape_html(&short)
        ));
    }
    lines
}

/// Renders the index as pages, each topic paginated on its own.
///
/// An empty index renders no pages.
#[must_use]
pub fn render_topic_pages(index: &TopicIndex, budget: usize) -> Vec<String> {
    index
        .sections()
        .iter()
        .flat_map(|section| paginate(&topic_lines(&section.topic, &section.entries), budget))
        .collect()
}

/// Groups `lines` into pages of at most `budget` characters.
///
/// Lines are never split across pages: when the next line does not fit,
/// the page is closed and the line starts a new one. A single line longer
/// than the budget is cut to fit a page of its own.
#[must_use]
pub fn paginate(lines: &[String], budget: usize) -> Vec<String> {
    let budget = budget.max(1);
    let mut pages = Vec::new();
    let mut page = String::new();
    let mut page_chars = 0usize;

    for line in lines {
        let line_chars = line.chars().count();
        let line: String = if line_chars > budget {
            line.chars().take(budget).collect()
        } else {
            line.clone()
        };
        let line_chars = line_chars.min(budget);

        let needed = if page.is_empty() {
            line_chars
        } else {
            page_chars + 1 + line_chars
        };

        if !page.is_empty() && needed > budget {
            pages.push(std::mem::take(&mut page));
            page_chars = 0;
        }

        if !page.is_empty() {
            page.push('\n');
            page_chars += 1;
        }
        page.push_str(&line);
        page_chars += line_chars;
    }

    if !page.is_empty() {
        pages.push(page);
    }
    pages
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::index::TopicIndexEntry;

    fn lines(n: usize, width: usize) -> Vec<String> {
        (0..n).map(|i| format!("{i:0width$}")).collect()
    }

    #[test]
    fn test_paginate_fits_single_page() {
        let pages = paginate(&lines(3, 4), 100);
        assert_eq!(pages, vec!["0000\n0001\n0002".to_string()]);
    }

    #[test]
    fn test_paginate_splits_without_breaking_lines() {
        let source = lines(50, 100);
        let pages = paginate(&source, 1000);

        assert!(pages.len() >= 2);
        for page in &pages {
            assert!(page.chars().count() <= 1000);
        }
        let rejoined: Vec<String> = pages
            .iter()
            .flat_map(|p| p.split('\n').map(str::to_string))
            .collect();
        assert_eq!(rejoined, source);
    }

    #[test]
    fn test_paginate_exact_fit_boundary() {
        // two 4-char lines plus separator = 9 chars
        let pages = paginate(&lines(2, 4), 9);
        assert_eq!(pages.len(), 1);
        let pages = paginate(&lines(2, 4), 8);
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn test_paginate_cuts_oversized_line() {
        let pages = paginate(&["x".repeat(20)], 8);
        assert_eq!(pages, vec!["x".repeat(8)]);
    }

    #[test]
    fn test_paginate_counts_characters_not_bytes() {
        let pages = paginate(&["ज्या".to_string(), "ज्या".to_string()], 9);
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_paginate_empty() {
        assert!(paginate(&[], 10).is_empty());
    }

    #[test]
    fn test_summary_renders_zero_counts() {
        let summary = render_summary("Physics & Co", RunCounts::default());
        assert!(summary.contains("Physics &amp; Co"));
        assert!(summary.contains("Successful : <code>0</code>"));
    }

    #[test]
    fn test_topic_pages_are_per_topic() {
        let mut index = TopicIndex::new();
        index.push("Optics", TopicIndexEntry::new("Optics | Lens", "https://t.me/c/1/2"));
        index.push("Waves", TopicIndexEntry::new("Waves | Sound", "https://t.me/c/1/3"));

        let pages = render_topic_pages(&index, DEFAULT_PAGE_BUDGET);
        assert_eq!(pages.len(), 2);
        assert_eq!(
            pages[0],
            "• <b>Optics</b>\n  ─ <a href='https://t.me/c/1/2'>Optics | Lens</a>"
        );
    }

    #[test]
    fn test_topic_lines_truncate_long_titles() {
        let entry = TopicIndexEntry::new("t".repeat(120), "l");
        let lines = topic_lines("T", &[entry]);
        assert!(lines[1].contains(&format!("{}…", "t".repeat(80))));
    }
}
